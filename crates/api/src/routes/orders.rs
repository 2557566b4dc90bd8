//! Order lifecycle and saga status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{CircuitBreaker, CustomerId, Money, OrderId};
use domain::{Order, OrderLineItem, OrderService, OrderStatus, OrderStore};
use saga::{EventBus, SagaInstance, SagaOrchestrator, SagaStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<O: OrderStore, S: SagaStore, B: EventBus> {
    pub order_service: OrderService<O, SagaOrchestrator<S, B>>,
    pub orchestrator: SagaOrchestrator<S, B>,
    pub breaker: CircuitBreaker,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub saga_id: String,
    pub order_id: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let total_cents = order.total().cents();
        OrderResponse {
            id: order.id.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status.to_string(),
            created_at: order.created_at.to_rfc3339(),
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
            total_cents,
        }
    }
}

impl From<SagaInstance> for SagaStatusResponse {
    fn from(saga: SagaInstance) -> Self {
        SagaStatusResponse {
            saga_id: saga.saga_id.to_string(),
            order_id: saga.order_id.to_string(),
            status: saga.status.to_string(),
            started_at: saga.started_at.to_rfc3339(),
            completed_at: saga.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

// -- Handlers --

/// POST /orders — create a new order and open its saga.
#[tracing::instrument(skip(state, req))]
pub async fn create<O, S, B>(
    State(state): State<Arc<AppState<O, S, B>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError>
where
    O: OrderStore + 'static,
    S: SagaStore + 'static,
    B: EventBus + 'static,
{
    let customer_id = match req.customer_id {
        Some(ref id_str) => {
            let uuid = uuid::Uuid::parse_str(id_str)
                .map_err(|e| ApiError::BadRequest(format!("Invalid customer_id: {e}")))?;
            CustomerId::from_uuid(uuid)
        }
        None => CustomerId::new(),
    };

    let items: Vec<OrderLineItem> = req
        .items
        .iter()
        .map(|item| {
            OrderLineItem::new(
                item.product_name.as_str(),
                item.quantity,
                Money::from_cents(item.unit_price_cents),
            )
        })
        .collect();

    let order = state
        .breaker
        .call(
            "create_order",
            state.order_service.create_order(customer_id, items),
        )
        .await?;

    Ok((axum::http::StatusCode::CREATED, Json(order.into())))
}

/// GET /orders — list orders, optionally filtered by status.
#[tracing::instrument(skip(state))]
pub async fn list<O, S, B>(
    State(state): State<Arc<AppState<O, S, B>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    O: OrderStore + 'static,
    S: SagaStore + 'static,
    B: EventBus + 'static,
{
    let filter = params.status.as_deref().map(parse_status).transpose()?;
    let orders = state.order_service.list_orders(filter).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<O, S, B>(
    State(state): State<Arc<AppState<O, S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    O: OrderStore + 'static,
    S: SagaStore + 'static,
    B: EventBus + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.order_service.get_order(order_id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/:id/cancel — cancel a pending order and compensate its saga.
#[tracing::instrument(skip(state))]
pub async fn cancel<O, S, B>(
    State(state): State<Arc<AppState<O, S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    O: OrderStore + 'static,
    S: SagaStore + 'static,
    B: EventBus + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .breaker
        .call("cancel_order", state.order_service.cancel_order(order_id))
        .await?;
    Ok(Json(order.into()))
}

/// PUT /orders/:id/status — move an order along its lifecycle.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<O, S, B>(
    State(state): State<Arc<AppState<O, S, B>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    O: OrderStore + 'static,
    S: SagaStore + 'static,
    B: EventBus + 'static,
{
    let order_id = parse_order_id(&id)?;
    let status = parse_status(&req.status)?;
    let order = state
        .order_service
        .update_order_status(order_id, status)
        .await?;
    Ok(Json(order.into()))
}

/// GET /orders/:id/saga — get the saga instance tracking an order.
#[tracing::instrument(skip(state))]
pub async fn saga_status<O, S, B>(
    State(state): State<Arc<AppState<O, S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError>
where
    O: OrderStore + 'static,
    S: SagaStore + 'static,
    B: EventBus + 'static,
{
    let order_id = parse_order_id(&id)?;
    let saga = state
        .orchestrator
        .get_saga(order_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("No saga for order {id}")))?;
    Ok(Json(saga.into()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

fn parse_status(s: &str) -> Result<OrderStatus, ApiError> {
    OrderStatus::parse(s).ok_or_else(|| ApiError::BadRequest(format!("Unknown order status: {s}")))
}
