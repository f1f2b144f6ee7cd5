use crate::error::VexError;
use crate::server::handlers::{render_json, run_auction_from_body};
use crate::server::state::AppState;
use actix_web::{HttpRequest, HttpResponse, web};

/// POST /openrtb2/auction — OpenRTB 2.5 in, OpenRTB 2.5 out
pub async fn openrtb_auction(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VexError> {
    let source = "/openrtb2/auction";

    let context = run_auction_from_body(req, payload, &state, source).await?;

    Ok(render_json(context, source))
}
