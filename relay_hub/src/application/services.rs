use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use tracing::{info, warn};

use super::{
    connection::{self, ProbeSocket, WsConnection},
    HubContext,
};

#[get("/health_check")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}

#[get("/chat")]
pub async fn chat(
    req: HttpRequest,
    stream: web::Payload,
    hub: web::Data<HubContext>,
) -> Result<HttpResponse, Error> {
    if !hub.is_accepting() {
        warn!(peer = ?req.peer_addr(), "Refusing connection while stopping");
        return Ok(HttpResponse::ServiceUnavailable().finish());
    }
    info!(peer = ?req.peer_addr(), "server client added");
    let websocket = WsConnection::new(hub.registry.clone(), hub.notifier.clone());
    connection::start(websocket, &req, stream)
}

#[get("/open")]
pub async fn open(req: HttpRequest, stream: web::Payload) -> Result<HttpResponse, Error> {
    connection::start(ProbeSocket, &req, stream)
}
