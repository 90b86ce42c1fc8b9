//! Tools the model may call, and their execution against team data.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::web_search::WebSearch;
use crate::{
    entities::OrderStatus,
    errors::ServiceError,
    services::{
        bom::BomService,
        orders::OrderService,
        parts::{PartQuery, PartService},
    },
};

pub const QUERY_INVENTORY: &str = "query_inventory";
pub const GET_BOM_STATUS: &str = "get_bom_status";
pub const GET_ORDER_SUMMARY: &str = "get_order_summary";
pub const WEB_SEARCH: &str = "web_search";

const DEFAULT_INVENTORY_LIMIT: u64 = 20;
const MAX_INVENTORY_LIMIT: u64 = 50;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryInventoryArgs {
    search: Option<String>,
    low_stock_only: Option<bool>,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BomStatusArgs {
    subsystem: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrderSummaryArgs {
    status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WebSearchArgs {
    query: String,
}

/// OpenAI-style function definitions. `web_search` is listed only when search is enabled.
pub fn tool_definitions(web_search_enabled: bool) -> Vec<Value> {
    let statuses: Vec<String> = OrderStatus::ALL.iter().map(|s| s.to_string()).collect();
    let mut tools = vec![
        function(
            QUERY_INVENTORY,
            "Look up parts in the team's inventory.",
            json!({
                "type": "object",
                "properties": {
                    "search": {"type": "string", "description": "Text matched against name, part number and category"},
                    "low_stock_only": {"type": "boolean", "description": "Only parts at or below their reorder point"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": MAX_INVENTORY_LIMIT}
                },
                "additionalProperties": false
            }),
        ),
        function(
            GET_BOM_STATUS,
            "Bill-of-materials fulfillment by subsystem, with shortages.",
            json!({
                "type": "object",
                "properties": {
                    "subsystem": {"type": "string", "description": "Restrict to one subsystem"}
                },
                "additionalProperties": false
            }),
        ),
        function(
            GET_ORDER_SUMMARY,
            "Summarize the team's purchase orders. Without a status, open orders are listed.",
            json!({
                "type": "object",
                "properties": {
                    "status": {"type": "string", "enum": statuses}
                },
                "additionalProperties": false
            }),
        ),
    ];
    if web_search_enabled {
        tools.push(function(
            WEB_SEARCH,
            "Search the web for vendor, part or game-rule information.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        ));
    }
    tools
}

fn function(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters
        }
    })
}

fn tool_error(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, raw: &str) -> Result<T, Value> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| tool_error(format!("Invalid arguments for {tool}: {e}")))
}

/// Runs tool calls for one team. Failures come back as `{"error": ...}` for the model.
#[derive(Clone)]
pub struct ToolExecutor {
    parts: Arc<PartService>,
    bom: Arc<BomService>,
    orders: Arc<OrderService>,
    web_search: Option<Arc<dyn WebSearch>>,
}

impl ToolExecutor {
    pub fn new(
        parts: Arc<PartService>,
        bom: Arc<BomService>,
        orders: Arc<OrderService>,
        web_search: Option<Arc<dyn WebSearch>>,
    ) -> Self {
        Self {
            parts,
            bom,
            orders,
            web_search,
        }
    }

    pub fn definitions(&self) -> Vec<Value> {
        tool_definitions(self.web_search.is_some())
    }

    pub async fn execute(&self, team_id: Uuid, name: &str, arguments: &str) -> Value {
        info!(tool = name, team_id = %team_id, "Executing tool");
        let result = match name {
            QUERY_INVENTORY => match parse_args(name, arguments) {
                Ok(args) => self.query_inventory(team_id, args).await,
                Err(e) => return e,
            },
            GET_BOM_STATUS => match parse_args(name, arguments) {
                Ok(args) => self.bom_status(team_id, args).await,
                Err(e) => return e,
            },
            GET_ORDER_SUMMARY => match parse_args(name, arguments) {
                Ok(args) => self.order_summary(team_id, args).await,
                Err(e) => return e,
            },
            WEB_SEARCH => match parse_args(name, arguments) {
                Ok(args) => self.web_search(args).await,
                Err(e) => return e,
            },
            other => return tool_error(format!("Unknown tool: {other}")),
        };

        result.unwrap_or_else(|e| {
            warn!(tool = name, error = %e, "Tool failed");
            tool_error(e.response_message())
        })
    }

    async fn query_inventory(&self, team_id: Uuid, args: QueryInventoryArgs) -> Result<Value, ServiceError> {
        let limit = args
            .limit
            .unwrap_or(DEFAULT_INVENTORY_LIMIT)
            .clamp(1, MAX_INVENTORY_LIMIT);
        let page = self
            .parts
            .list_parts(
                team_id,
                PartQuery {
                    search: args.search,
                    low_stock: args.low_stock_only,
                    page: Some(1),
                    per_page: Some(limit),
                },
            )
            .await?;

        let parts: Vec<Value> = page
            .items
            .iter()
            .map(|p| {
                json!({
                    "name": p.part.name,
                    "part_number": p.part.part_number,
                    "category": p.part.category,
                    "location": p.part.location,
                    "quantity": p.part.quantity,
                    "reorder_point": p.part.reorder_point,
                    "low_stock": p.low_stock,
                })
            })
            .collect();
        Ok(json!({ "total_matching": page.total, "parts": parts }))
    }

    async fn bom_status(&self, team_id: Uuid, args: BomStatusArgs) -> Result<Value, ServiceError> {
        let status = self.bom.status(team_id, args.subsystem.as_deref()).await?;
        let report = &status.report;
        let shortages: Vec<Value> = crate::bom::shortages(&report.items)
            .into_iter()
            .map(|item| {
                json!({
                    "part": status.part_names.get(&item.part_id).cloned().unwrap_or_else(|| "Deleted part".to_string()),
                    "subsystem": item.subsystem,
                    "needed": item.quantity_needed,
                    "on_hand": item.on_hand,
                    "shortfall": item.shortfall,
                })
            })
            .collect();

        Ok(json!({
            "overall_percent": report.overall_percent,
            "fully_stocked": report.fully_stocked,
            "item_count": report.item_count,
            "subsystems": report.subsystems,
            "shortages": shortages,
        }))
    }

    async fn order_summary(&self, team_id: Uuid, args: OrderSummaryArgs) -> Result<Value, ServiceError> {
        let orders = self.orders.summaries(team_id, args.status, 25).await?;
        Ok(json!({ "orders": orders }))
    }

    async fn web_search(&self, args: WebSearchArgs) -> Result<Value, ServiceError> {
        let Some(search) = &self.web_search else {
            return Ok(tool_error("Web search is not configured"));
        };
        let query = args.query.trim();
        if query.is_empty() {
            return Ok(tool_error("query must not be empty"));
        }
        let results = search.search(query, 5).await?;
        Ok(json!({ "results": results }))
    }
}
