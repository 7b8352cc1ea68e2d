use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for bock-back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::alarm::alarm_config,
        crate::routes::bock::active_members,
        crate::routes::bock::resubscribe,
        crate::routes::sse::bock_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::bock::ActiveMembersResponse,
            crate::config::AlarmPlaybackConfig,
            crate::config::AnimationTimings,
            crate::config::AlarmColors,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "bock", description = "Members who currently have bock"),
        (name = "alarm", description = "Pause alarm presentation settings"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
