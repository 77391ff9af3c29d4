use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::request_otp,
        crate::api::auth::verify_otp,
        crate::api::users::get_profile,
        crate::api::users::update_profile,
        crate::api::results::get_results,
        crate::api::payment::list_plans,
        crate::api::payment::my_purchases,
        crate::api::payment::create_order,
        crate::api::payment::verify_payment,
        crate::api::payment::can_view,
        crate::api::payment::record_view,
        crate::api::payment::premium_request,
        crate::api::payment::my_requests,
        crate::api::notifications::save_token,
        crate::api::notifications::send_to_all,
        crate::api::notifications::send_personalized,
        crate::api::notifications::send_to_user
    ),
    components(
        schemas(
            crate::api::auth::RequestOtpBody,
            crate::api::auth::VerifyOtpBody,
            crate::api::auth::AuthResponse,
            crate::api::payment::CreateOrderBody,
            crate::api::payment::VerifyPaymentBody,
            crate::api::payment::RecordViewBody,
            crate::api::payment::PremiumRequestBody,
            crate::api::users::UpdateProfileBody,
            crate::api::notifications::SaveTokenBody,
            crate::api::notifications::BroadcastBody,
            crate::api::notifications::PersonalizedBroadcastBody,
            crate::api::notifications::SendToUserBody,
            crate::models::Plan,
            crate::models::Purchase,
            crate::models::CourseResult
        )
    ),
    tags(
        (name = "auth", description = "OTP authentication"),
        (name = "users", description = "Profile"),
        (name = "results", description = "Exam results"),
        (name = "payment", description = "Plans, purchases and view entitlements"),
        (name = "notifications", description = "Push notifications")
    )
)]
pub struct ApiDoc;
