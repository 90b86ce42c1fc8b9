//! Bounds for amounts stored in `DECIMAL(12, 2)` columns.

use rust_decimal::Decimal;

use crate::errors::ServiceError;

pub const MONEY_SCALE: u32 = 2;

/// Largest value a `DECIMAL(12, 2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Rejects negative prices, sub-cent precision and anything the column cannot store.
pub fn check_price(field: &str, price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "{field} cannot be negative"
        )));
    }
    if price.normalize().scale() > MONEY_SCALE {
        return Err(ServiceError::ValidationError(format!(
            "{field} allows at most {MONEY_SCALE} decimal places"
        )));
    }
    if price > MAX_AMOUNT {
        return Err(ServiceError::ValidationError(format!(
            "{field} cannot exceed {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

pub fn line_total(quantity: i32, unit_price: Decimal) -> Result<Decimal, ServiceError> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .filter(|total| *total <= MAX_AMOUNT)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("Line total cannot exceed {MAX_AMOUNT}"))
        })
}

pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, ServiceError> {
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Order total cannot exceed {MAX_AMOUNT}"))
            })
    })
}
