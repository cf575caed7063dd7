use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use uuid::Uuid;

use super::dto::{CreateOrderRequest, ListOrdersQuery, OrderResponse};
use crate::domain::order::{OrderError, OrderLifecycleManager};

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Mount the order endpoints under /api/v1/orders.
/// Expects `web::Data<OrderLifecycleManager>` in the app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/orders")
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                OrderError::InvalidRequest(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                OrderError::InvalidRequest(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                OrderError::InvalidRequest(err.to_string()).into()
            }))
            .route("", web::post().to(create_order))
            .route("", web::get().to(list_orders))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/cancel", web::post().to(cancel_order)),
    );
}

/// Caller identity taken from the `X-User-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerId(pub String);

impl FromRequest for CustomerId {
    type Error = OrderError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let customer_id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        ready(match customer_id {
            Some(id) => Ok(CustomerId(id.to_string())),
            None => Err(OrderError::InvalidRequest(format!(
                "Missing required header: {USER_ID_HEADER}"
            ))),
        })
    }
}

async fn create_order(
    manager: web::Data<OrderLifecycleManager>,
    customer: CustomerId,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, OrderError> {
    let order = manager.create(body.into_inner().into_command(customer.0)).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

async fn get_order(
    manager: web::Data<OrderLifecycleManager>,
    customer: CustomerId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, OrderError> {
    let order = manager.get(path.into_inner(), &customer.0).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

async fn list_orders(
    manager: web::Data<OrderLifecycleManager>,
    customer: CustomerId,
    query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, OrderError> {
    let query = query.into_inner();
    let page = manager
        .list(&customer.0, query.status.as_deref(), query.page, query.size)
        .await?;
    Ok(HttpResponse::Ok().json(page.map(OrderResponse::from)))
}

async fn cancel_order(
    manager: web::Data<OrderLifecycleManager>,
    customer: CustomerId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, OrderError> {
    let order = manager.cancel(path.into_inner(), &customer.0).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
