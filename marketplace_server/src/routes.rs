//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into
//! a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the storage backend, which actix's attribute macros cannot express;
//! the `route!` macro below generates the registration boilerplate instead, including the ACL
//! wrapper for routes restricted to particular roles.

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use marketplace_engine::{
    db_types::{PaymentId, Role},
    traits::MarketplaceDatabase,
    OrderFlowApi,
    PaymentFlowApi,
};

use crate::{
    auth::JwtClaims,
    data_objects::{NewOrderPayload, PaymentPayload, StatusUpdatePayload},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so registration is implemented manually via this
// macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $bound:ty) => {
        paste::paste! { pub struct [<$name:camel Route>]<TB>(core::marker::PhantomData<fn() -> TB>); }
        paste::paste! {
            impl<TB> [<$name:camel Route>]<TB> {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self(core::marker::PhantomData)
                }
            }
        }
        paste::paste! {
            impl<TB> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<TB>
            where TB: $bound + 'static
            {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name::<TB>);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $bound:ty where requires [$($roles:tt)+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<TB>(core::marker::PhantomData<fn() -> TB>); }
        paste::paste! {
            impl<TB> [<$name:camel Route>]<TB> {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self(core::marker::PhantomData)
                }
            }
        }
        paste::paste! {
            impl<TB> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<TB>
            where TB: $bound + 'static
            {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name::<TB>)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles)+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl MarketplaceDatabase where requires [Role::Client]);
/// Place a new order. Client-only; the order is owned by the authenticated user and the total is
/// computed from the service's base price and the quantity.
pub async fn create_order<TB: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<NewOrderPayload>,
    api: web::Data<OrderFlowApi<TB>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST /orders for user #{}", claims.sub);
    let order = api.create_order(body.into_inner().into_new_order(claims.sub), &claims.actor()).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(assign_order => Post "/orders/{order_id}/assign" impl MarketplaceDatabase where requires [Role::Worker]);
/// Claim a paid order for the authenticated worker.
pub async fn assign_order<TB: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<TB>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST /orders/{order_id}/assign by worker #{}", claims.sub);
    let order = api.assign(order_id, &claims.actor()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Post "/orders/{order_id}/status" impl MarketplaceDatabase);
/// Change an order's status. Open to any authenticated user; the engine checks the caller's
/// relationship to the order and the legality of the transition.
pub async fn update_order_status<TB: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<StatusUpdatePayload>,
    api: web::Data<OrderFlowApi<TB>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let payload = body.into_inner();
    debug!("💻️ POST /orders/{order_id}/status → {} by #{}", payload.status, claims.sub);
    let order = api.update_status(order_id, payload.status, &payload.comment, &claims.actor()).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------  Payments  ----------------------------------------------------
route!(initiate_payment => Post "/orders/{order_id}/payments" impl MarketplaceDatabase where requires [Role::Client]);
/// Pay for a pending order. Blocks on the gateway call (bounded by the configured timeout) and
/// returns the final payment record together with the raw gateway document, for approved and
/// declined payments alike.
pub async fn initiate_payment<TB: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<PaymentPayload>,
    api: web::Data<PaymentFlowApi<TB>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST /orders/{order_id}/payments by client #{}", claims.sub);
    let result = api.initiate(order_id, body.into_inner().into_payment_request(), &claims.actor()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "payment": result.payment,
        "gateway_response": result.gateway_response,
    })))
}

route!(refund_payment => Post "/payments/{payment_id}/refund" impl MarketplaceDatabase);
/// Refund a completed payment. Open to any authenticated user; the engine restricts the operation
/// to the paying user or an admin.
pub async fn refund_payment<TB: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<PaymentId>,
    api: web::Data<PaymentFlowApi<TB>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    debug!("💻️ POST /payments/{payment_id}/refund by #{}", claims.sub);
    let result = api.refund(&payment_id, &claims.actor()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "payment": result.payment,
        "refund_response": result.refund_response,
    })))
}
