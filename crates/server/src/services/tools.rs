//! Tool definitions and executor for the assistant's tool loop.
//!
//! Two tool families exist: commerce tools (`search_products`, `lookup_order`)
//! offered only when the tenant has a commerce platform connected, and
//! `search_content`, which is always offered and searches the tenant's
//! scraped site content.
//!
//! Tool failures never fail a chat request. The router converts every error
//! into an error tool result so the model can apologize or answer from
//! context instead of the visitor seeing a 500.

use std::sync::Arc;

use serde_json::json;
use tracing::{instrument, warn};

use anchorchat_core::{OrganizationId, TenantDomain};

use crate::commerce::{CommerceProvider, summarize_order, summarize_products};
use crate::model::Tool;
use crate::search::SemanticIndex;

const DEFAULT_PRODUCT_LIMIT: i64 = 5;
const DEFAULT_CONTENT_LIMIT: usize = 5;

/// The tool set offered to the model for a request.
///
/// Commerce tools are included only when a provider resolved for the tenant.
#[must_use]
pub fn available_tools(has_commerce: bool) -> Vec<Tool> {
    let mut tools = Vec::new();

    if has_commerce {
        tools.push(Tool::function(
            "search_products",
            "Search the store's product catalog. Returns product names, prices, stock status, and links.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Product search terms (e.g., 'red running shoes')"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Number of products to return (1-20, default 5)",
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["query"]
            }),
        ));
        tools.push(Tool::function(
            "lookup_order",
            "Look up the status of a customer's order by order number. Ask for the email on the order when the customer hasn't provided it.",
            json!({
                "type": "object",
                "properties": {
                    "order_number": {
                        "type": "string",
                        "description": "The order number or reference the customer received"
                    },
                    "email": {
                        "type": "string",
                        "description": "Email address the order was placed with"
                    }
                },
                "required": ["order_number"]
            }),
        ));
    }

    tools.push(Tool::function(
        "search_content",
        "Search the store's website content (shipping policies, FAQs, product guides). Use this for questions the catalog can't answer.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in the site content"
                }
            },
            "required": ["query"]
        }),
    ));

    tools
}

/// Result of executing a single tool call.
#[derive(Debug)]
pub struct ToolOutcome {
    /// Tool result content for the model.
    pub content: String,
    /// Whether the tool failed.
    pub is_error: bool,
    /// Source URLs surfaced by this tool, for answer citations.
    pub sources: Vec<String>,
}

impl ToolOutcome {
    fn ok(content: String, sources: Vec<String>) -> Self {
        Self {
            content,
            is_error: false,
            sources,
        }
    }

    fn error(message: String) -> Self {
        Self {
            content: message,
            is_error: true,
            sources: Vec::new(),
        }
    }
}

/// Executor mapping tool names to provider and index calls.
pub struct ToolRouter {
    commerce: Option<Arc<dyn CommerceProvider>>,
    index: Arc<dyn SemanticIndex>,
    organization_id: OrganizationId,
    domain: TenantDomain,
}

impl ToolRouter {
    /// Create a tool router for one request's tenant context.
    #[must_use]
    pub const fn new(
        commerce: Option<Arc<dyn CommerceProvider>>,
        index: Arc<dyn SemanticIndex>,
        organization_id: OrganizationId,
        domain: TenantDomain,
    ) -> Self {
        Self {
            commerce,
            index,
            organization_id,
            domain,
        }
    }

    /// Execute a tool call.
    ///
    /// Never returns an `Err`: failures become error tool outcomes.
    #[instrument(skip(self, input), fields(tool_name = %name))]
    pub async fn execute(&self, name: &str, input: &serde_json::Value) -> ToolOutcome {
        match name {
            "search_products" => self.search_products(input).await,
            "lookup_order" => self.lookup_order(input).await,
            "search_content" => self.search_content(input).await,
            _ => {
                warn!("model requested unknown tool");
                ToolOutcome::error(format!("Unknown tool: {name}"))
            }
        }
    }

    async fn search_products(&self, input: &serde_json::Value) -> ToolOutcome {
        let Some(commerce) = &self.commerce else {
            return ToolOutcome::error("No commerce platform is connected for this store.".into());
        };
        let Some(query) = input["query"].as_str() else {
            return ToolOutcome::error("Missing required parameter: query".into());
        };
        let limit = input["limit"]
            .as_i64()
            .unwrap_or(DEFAULT_PRODUCT_LIMIT)
            .clamp(1, 20);

        match commerce
            .search_products(query, usize::try_from(limit).unwrap_or(5))
            .await
        {
            Ok(products) => {
                let sources = products.iter().filter_map(|p| p.url.clone()).collect();
                let summary = summarize_products(&products);
                ToolOutcome::ok(summary.to_string(), sources)
            }
            Err(e) => {
                warn!(error = %e, "product search failed");
                ToolOutcome::error(format!("Product search failed: {e}"))
            }
        }
    }

    async fn lookup_order(&self, input: &serde_json::Value) -> ToolOutcome {
        let Some(commerce) = &self.commerce else {
            return ToolOutcome::error("No commerce platform is connected for this store.".into());
        };
        let Some(reference) = input["order_number"].as_str() else {
            return ToolOutcome::error("Missing required parameter: order_number".into());
        };
        let email = input["email"].as_str();

        match commerce.lookup_order(reference, email).await {
            Ok(Some(order)) => ToolOutcome::ok(summarize_order(&order).to_string(), Vec::new()),
            Ok(None) => ToolOutcome::ok(
                json!({
                    "found": false,
                    "message": "No order matched that number and email."
                })
                .to_string(),
                Vec::new(),
            ),
            Err(e) => {
                warn!(error = %e, "order lookup failed");
                ToolOutcome::error(format!("Order lookup failed: {e}"))
            }
        }
    }

    async fn search_content(&self, input: &serde_json::Value) -> ToolOutcome {
        let Some(query) = input["query"].as_str() else {
            return ToolOutcome::error("Missing required parameter: query".into());
        };

        match self
            .index
            .search(self.organization_id, &self.domain, query, DEFAULT_CONTENT_LIMIT)
            .await
        {
            Ok(hits) => {
                let sources: Vec<String> = hits.iter().map(|h| h.url.clone()).collect();
                let chunks: Vec<serde_json::Value> = hits
                    .iter()
                    .map(|h| {
                        json!({
                            "url": h.url,
                            "title": h.title,
                            "content": h.snippet,
                        })
                    })
                    .collect();
                ToolOutcome::ok(
                    json!({ "count": chunks.len(), "results": chunks }).to_string(),
                    sources,
                )
            }
            Err(e) => {
                warn!(error = %e, "content search failed");
                ToolOutcome::error(format!("Content search failed: {e}"))
            }
        }
    }
}
