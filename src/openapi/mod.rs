use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TeamHub API",
        version = "1.0.0",
        description = r#"
# TeamHub

Parts inventory, bill of materials and purchasing for FTC, FRC and FLL robotics teams,
with a Discord assistant that answers questions about the team's build.

## Authentication

Sign in with `POST /api/v1/auth/login`. The response sets an HTTP-only session cookie
that must accompany every other request.

## Errors

Failures share one shape:

```json
{ "error": "Not Found", "message": "Not found: Part ... not found", "timestamp": "..." }
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "auth", description = "Accounts and sessions"),
        (name = "teams", description = "Teams and their settings"),
        (name = "members", description = "Team membership and roles"),
        (name = "vendors", description = "Global and team vendors"),
        (name = "parts", description = "Inventory"),
        (name = "bom", description = "Bill of materials and fulfillment"),
        (name = "orders", description = "Purchase orders"),
        (name = "discord", description = "Discord interactions webhook"),
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,
        crate::handlers::auth::update_me,
        crate::handlers::auth::delete_me,

        crate::handlers::teams::list_teams,
        crate::handlers::teams::create_team,
        crate::handlers::teams::get_team,
        crate::handlers::teams::update_team,

        crate::handlers::members::list_members,
        crate::handlers::members::add_member,
        crate::handlers::members::update_member_role,
        crate::handlers::members::remove_member,

        crate::handlers::vendors::list_team_vendors,
        crate::handlers::vendors::create_team_vendor,
        crate::handlers::vendors::create_global_vendor,
        crate::handlers::vendors::get_vendor,
        crate::handlers::vendors::update_vendor,

        crate::handlers::parts::list_parts,
        crate::handlers::parts::create_part,
        crate::handlers::parts::low_stock_parts,
        crate::handlers::parts::get_part,
        crate::handlers::parts::update_part,
        crate::handlers::parts::adjust_part,

        crate::handlers::bom::list_bom_items,
        crate::handlers::bom::create_bom_item,
        crate::handlers::bom::update_bom_item,
        crate::handlers::bom::delete_bom_item,
        crate::handlers::bom::bom_status,
        crate::handlers::bom::bom_shortages,

        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::add_order_item,
        crate::handlers::orders::remove_order_item,
        crate::handlers::orders::update_order_status,

        crate::handlers::discord::interactions,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::ResponseMeta,

            crate::auth::RegisterRequest,
            crate::auth::LoginRequest,
            crate::auth::UpdateProfileRequest,
            crate::auth::UserResponse,

            crate::entities::team::Model,
            crate::entities::team::Program,
            crate::entities::team_member::MemberRole,
            crate::services::teams::CreateTeamRequest,
            crate::services::teams::UpdateTeamRequest,
            crate::services::teams::TeamWithRole,
            crate::services::members::AddMemberRequest,
            crate::services::members::UpdateMemberRoleRequest,
            crate::services::members::MemberResponse,

            crate::entities::vendor::Model,
            crate::services::vendors::CreateVendorRequest,
            crate::services::vendors::UpdateVendorRequest,

            crate::entities::part::Model,
            crate::services::parts::CreatePartRequest,
            crate::services::parts::UpdatePartRequest,
            crate::services::parts::AdjustQuantityRequest,
            crate::services::parts::QuantityAdjustment,
            crate::services::parts::PartResponse,
            crate::services::parts::AdjustmentResponse,

            crate::entities::bom_item::Model,
            crate::services::bom::CreateBomItemRequest,
            crate::services::bom::UpdateBomItemRequest,
            crate::services::bom::BomItemStatus,
            crate::services::bom::BomStatusResponse,
            crate::bom::FulfillmentState,
            crate::bom::ItemFulfillment,
            crate::bom::SubsystemProgress,
            crate::bom::FulfillmentReport,

            crate::entities::order::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order_item::Model,
            crate::services::orders::OrderItemRequest,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderRequest,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::OrderWithItems,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_team_routes() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("TeamHub API"));
        assert!(json.contains("/api/v1/teams/{id}/bom/status"));
        assert!(json.contains("/api/v1/parts/{id}/adjust"));
        assert!(json.contains("/api/v1/discord/interactions"));
    }
}
