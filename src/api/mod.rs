// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Role,
    contract::HandwrittenSignature,
    policy::{ExpirySummary, PolicyStatus, ReviewDecision},
    settlement::PaymentConfirmation,
    state::AppState,
    storage::{AuditEvent, AuditEventType, Policy, Product, SettlementRecord},
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod policies;
pub mod products;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/nonce", post(auth::nonce))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/me", get(auth::me))
        .route("/products", get(products::list_products))
        .route("/products/{product_id}", get(products::get_product))
        .route(
            "/policies",
            get(policies::list_policies).post(policies::create_policy),
        )
        .route("/policies/contract-sign", post(policies::sign_contract))
        .route("/policies/payment-confirm", post(policies::confirm_payment))
        .route("/policies/{policy_id}", get(policies::get_policy))
        .route("/admin/policies", get(admin::list_policies))
        .route("/admin/policies/expire", post(admin::expire_policies))
        .route(
            "/admin/policies/{policy_id}",
            get(admin::get_policy).patch(admin::review_policy),
        )
        .route("/admin/audit", get(admin::query_audit_logs))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::nonce,
        auth::verify,
        auth::me,
        products::list_products,
        products::get_product,
        policies::create_policy,
        policies::list_policies,
        policies::get_policy,
        policies::sign_contract,
        policies::confirm_payment,
        admin::list_policies,
        admin::get_policy,
        admin::review_policy,
        admin::expire_policies,
        admin::query_audit_logs,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            Role,
            Policy,
            PolicyStatus,
            Product,
            SettlementRecord,
            PaymentConfirmation,
            HandwrittenSignature,
            ReviewDecision,
            ExpirySummary,
            AuditEvent,
            AuditEventType,
            auth::NonceRequest,
            auth::NonceResponse,
            auth::VerifyRequest,
            auth::VerifyResponse,
            auth::MeResponse,
            products::ProductListResponse,
            policies::CreatePolicyRequest,
            policies::PolicyListResponse,
            policies::SignContractRequest,
            policies::PaymentConfirmRequest,
            admin::AdminPolicyListResponse,
            admin::AdminPolicyDetail,
            admin::ReviewRequest,
            admin::AuditLogResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Wallet sign-in"),
        (name = "Products", description = "Product catalog"),
        (name = "Policies", description = "Policy application, contract signing and payment"),
        (name = "Admin", description = "Underwriting, expiry and audit"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
