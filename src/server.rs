//! HTTP surface: serves resolved pages and a metrics health check.

use crate::assembler::PageProps;
use crate::generation::Renderer;
use crate::resolver::{Resolution, Resolver};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const CACHE_HEADER: &str = "x-page-cache";

pub fn router(resolver: Resolver) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(page)
        .with_state(resolver)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(router: Router, port: u16) -> Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);
    axum::serve(listener, router)
        .await
        .context("HTTP server exited with an error")
}

async fn health(State(resolver): State<Resolver>) -> impl IntoResponse {
    let machine = resolver.machine();
    Json(serde_json::json!({
        "status": "ok",
        "generation": machine.metrics().report(),
        "translations": machine.assembler().loader().metrics().report(),
    }))
}

async fn page(State(resolver): State<Resolver>, uri: Uri) -> Response {
    match resolver.resolve_url(uri.path()).await {
        Resolution::Page { page, cache } => (
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (HeaderName::from_static(CACHE_HEADER), cache.as_str()),
            ],
            page.markup.clone(),
        )
            .into_response(),
        Resolution::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
        // resolve_url waits for builds, so this only shows up if that changes
        Resolution::PendingBuild => {
            (StatusCode::SERVICE_UNAVAILABLE, "Page is being built").into_response()
        }
        Resolution::Failed(failure) => {
            error!("Serving 500 for {}: {}", uri.path(), failure);
            (StatusCode::INTERNAL_SERVER_ERROR, "Page build failed").into_response()
        }
    }
}

/// Renders a page as a bare HTML document carrying its props as embedded JSON.
pub fn props_renderer() -> Arc<dyn Renderer> {
    Arc::new(PropsRenderer)
}

struct PropsRenderer;

impl Renderer for PropsRenderer {
    fn render(&self, props: Arc<PageProps>) -> BoxFuture<'static, Result<String>> {
        async move {
            let json = serde_json::to_string(props.as_ref())
                .context("Failed to serialize page props")?
                .replace("</", "<\\/");
            Ok(format!(
                "<!DOCTYPE html>\n<html lang=\"{}\"><head><meta charset=\"utf-8\"></head><body>\
                 <script id=\"__PAGE_PROPS__\" type=\"application/json\">{}</script></body></html>",
                props.locale, json
            ))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::PageAssembler;
    use crate::generation::GenerationMachine;
    use crate::i18n::{LocaleRegistry, StaticTranslationSource, TranslationLoader};
    use crate::routes::{RouteCatalogue, RouteTemplate};

    fn resolver() -> Resolver {
        let registry = Arc::new(LocaleRegistry::new(["en", "de"], "en").unwrap());
        let catalogue = Arc::new(
            RouteCatalogue::new(
                Arc::clone(&registry),
                vec![RouteTemplate::new("solutions/payments").unwrap()],
            )
            .unwrap(),
        );
        let source = StaticTranslationSource::new()
            .with_namespace("en", "common", r#"{"title": "Payments"}"#)
            .with_namespace("de", "common", r#"{"title": "Zahlungen"}"#);
        let loader = Arc::new(TranslationLoader::new(registry, Arc::new(source)));
        let assembler = PageAssembler::new(Arc::clone(&catalogue), loader);
        let machine = GenerationMachine::new(Arc::clone(&catalogue), assembler, props_renderer());
        Resolver::new(catalogue, machine)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_page_miss_then_hit() {
        let resolver = resolver();
        let uri: Uri = "/de/solutions/payments".parse().unwrap();

        let first = page(State(resolver.clone()), uri.clone()).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[CACHE_HEADER], "MISS");
        let body = body_text(first).await;
        assert!(body.contains("lang=\"de\""));
        assert!(body.contains("Zahlungen"));

        let second = page(State(resolver), uri).await;
        assert_eq!(second.headers()[CACHE_HEADER], "HIT");
    }

    #[tokio::test]
    async fn test_unknown_paths_are_404() {
        let resolver = resolver();
        for path in ["/fr/solutions/payments", "/en/solutions/gaming", "/"] {
            let response = page(State(resolver.clone()), path.parse().unwrap()).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_health_reports_metrics() {
        let resolver = resolver();
        page(State(resolver.clone()), "/solutions/payments".parse().unwrap()).await;

        let response = health(State(resolver)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["generation"]["builds_succeeded"], 1);
        assert!(json["translations"].is_object());
    }

    #[tokio::test]
    async fn test_props_renderer_escapes_script_end() {
        let props = PageProps {
            locale: "en".to_string(),
            params: Default::default(),
            translations: [(
                "common".to_string(),
                [("x".to_string(), "</script>".to_string())].into_iter().collect(),
            )]
            .into_iter()
            .collect(),
            revalidate_seconds: 60,
            last_generated_at: None,
        };
        let html = props_renderer().render(Arc::new(props)).await.unwrap();
        assert_eq!(html.matches("</script>").count(), 1);
    }
}
