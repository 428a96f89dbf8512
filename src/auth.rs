use std::env;
use std::future::Future;

use axum::{
    extract::{FromRequestParts, Json, Path, Query, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, RedirectUrl, TokenUrl,
};
use oauth2::TokenResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::IdentityConfig;
use crate::db;
use crate::db::models::{RecipientProfile, Role, UserDonationStats, UserSettings, VerificationStatus};
use crate::AppState;

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Deserialize)]
pub struct AuthCallback {
    code: String,
    state: String,
}

#[derive(Deserialize)]
pub struct SignUpRequest {
    email: String,
    password: String,
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    user: UserProfile,
}

#[derive(Serialize, Clone)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub provider: String,
}

// Claims for our session JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    sub: String,
    exp: usize,
    email: String,
    provider: String,
    name: String,
    iss: Option<String>,
    aud: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    exp: usize,
    provider: String,
    nonce: String,
}

/// The authenticated principal for one request. Flows receive this
/// explicitly; there is no process-wide current user.
pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub provider: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync + 'static,
{
    type Rejection = (StatusCode, String);

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = extract_token_from_headers(&parts.headers)
                .ok_or((StatusCode::UNAUTHORIZED, "Missing auth token".to_string()))?;
            let claims = validate_token_str(&token).map_err(|e| {
                tracing::error!("Token error: {}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            })?;

            Ok(AuthenticatedUser {
                id: claims.sub,
                email: claims.email,
                name: claims.name,
                provider: claims.provider,
            })
        }
    }
}

/// Client for the external identity provider's REST account endpoints. The
/// provider owns credential storage and password hashing; this server only
/// exchanges credentials for a provider account and mints its own session.
#[derive(Clone)]
pub struct IdentityClient {
    config: IdentityConfig,
    http: reqwest::Client,
}

pub struct ProviderAccount {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

impl IdentityClient {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn account_call(&self, action: &str, body: Value) -> anyhow::Result<Value> {
        let url = format!(
            "{}/accounts:{}?key={}",
            self.config.base_url, action, self.config.api_key
        );
        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let detail: Value = resp.json().await.unwrap_or_default();
            let message = detail
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .unwrap_or("provider error")
                .to_string();
            return Err(anyhow::anyhow!(message));
        }
        Ok(resp.json().await?)
    }

    fn parse_account(json: &Value) -> anyhow::Result<ProviderAccount> {
        let id = json
            .get("localId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing account id"))?
            .to_string();
        let email = json
            .get("email")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown@example.com")
            .to_string();
        let name = json
            .get("displayName")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Ok(ProviderAccount { id, email, name })
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<ProviderAccount> {
        let json = self
            .account_call(
                "signUp",
                serde_json::json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Self::parse_account(&json)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<ProviderAccount> {
        let json = self
            .account_call(
                "signInWithPassword",
                serde_json::json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Self::parse_account(&json)
    }

    pub async fn update_display_name(&self, user_id: &str, name: &str) -> anyhow::Result<()> {
        self.account_call(
            "update",
            serde_json::json!({
                "localId": user_id,
                "displayName": name,
            }),
        )
        .await?;
        Ok(())
    }
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> impl IntoResponse {
    let identity = IdentityClient::new(state.config.identity.clone());
    let account = match identity.sign_up(&payload.email, &payload.password).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!("Sign-up rejected: {}", e);
            return (StatusCode::BAD_REQUEST, "Sign up failed").into_response();
        }
    };

    if let Some(name) = payload.name.as_deref() {
        if let Err(e) = identity.update_display_name(&account.id, name).await {
            tracing::error!("Display name update failed: {}", e);
        }
    }

    let user = UserProfile {
        id: account.id,
        email: account.email,
        name: payload.name.unwrap_or_else(|| "User".to_string()),
        provider: "password".to_string(),
    };

    if let Err(e) = db::ensure_user_defaults(&state.db, &user.id).await {
        tracing::error!("Default profile seed failed: {}", e);
    }

    issue_session(user)
}

pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> impl IntoResponse {
    let identity = IdentityClient::new(state.config.identity.clone());
    let account = match identity.sign_in(&payload.email, &payload.password).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!("Sign-in rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();
        }
    };

    let user = UserProfile {
        id: account.id,
        email: account.email,
        name: account.name.unwrap_or_else(|| "User".to_string()),
        provider: "password".to_string(),
    };

    if let Err(e) = db::ensure_user_defaults(&state.db, &user.id).await {
        tracing::error!("Default profile seed failed: {}", e);
    }

    issue_session(user)
}

fn issue_session(user: UserProfile) -> axum::response::Response {
    match create_jwt(&user) {
        Ok(token) => {
            let cookie = build_auth_cookie(&token);
            let mut response = Json(AuthResponse { user }).into_response();
            response
                .headers_mut()
                .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
            response
        }
        Err(e) => {
            tracing::error!("JWT creation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Auth failed").into_response()
        }
    }
}

pub async fn login(Path(provider): Path<String>) -> impl IntoResponse {
    let cfg = match load_provider_config(&provider) {
        Ok(c) => c,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    let client = BasicClient::new(ClientId::new(cfg.client_id))
        .set_client_secret(ClientSecret::new(cfg.client_secret))
        .set_auth_uri(AuthUrl::new(cfg.auth_url).unwrap())
        .set_token_uri(TokenUrl::new(cfg.token_url).unwrap())
        .set_redirect_uri(RedirectUrl::new(cfg.redirect_url).unwrap());

    let state = match create_state_token(&provider) {
        Ok(s) => s,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let (authorize_url, _csrf_state) = client
        .authorize_url(|| oauth2::CsrfToken::new(state))
        .url();

    Redirect::to(authorize_url.as_str()).into_response()
}

pub async fn callback(
    Path(provider): Path<String>,
    Query(params): Query<AuthCallback>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let cfg = match load_provider_config(&provider) {
        Ok(c) => c,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    if let Err(e) = validate_state_token(&params.state, &provider) {
        tracing::warn!("OAuth state invalid: {}", e);
        return (StatusCode::UNAUTHORIZED, "Invalid state").into_response();
    }

    let client = BasicClient::new(ClientId::new(cfg.client_id))
        .set_client_secret(ClientSecret::new(cfg.client_secret))
        .set_auth_uri(AuthUrl::new(cfg.auth_url).unwrap())
        .set_token_uri(TokenUrl::new(cfg.token_url).unwrap())
        .set_redirect_uri(RedirectUrl::new(cfg.redirect_url).unwrap());

    let http_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build reqwest client");

    let token_result = client
        .exchange_code(AuthorizationCode::new(params.code.clone()))
        .request_async(&http_client)
        .await;
    let token_result = match token_result {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("OAuth token exchange failed: {}", e);
            return (StatusCode::BAD_GATEWAY, "OAuth token exchange failed").into_response();
        }
    };

    let access_token = token_result.access_token().secret();
    let profile = match fetch_user_profile(&cfg.userinfo_url, access_token).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Userinfo fetch failed: {}", e);
            return (StatusCode::BAD_GATEWAY, "Userinfo fetch failed").into_response();
        }
    };

    let user = UserProfile {
        id: profile.id,
        email: profile.email,
        name: profile.name,
        provider,
    };

    if let Err(e) = db::ensure_user_defaults(&state.db, &user.id).await {
        tracing::error!("Default profile seed failed: {}", e);
    }

    let token = match create_jwt(&user) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("JWT creation failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Auth failed").into_response();
        }
    };

    let cookie = build_auth_cookie(&token);
    let mut response = Redirect::to("/").into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
    response
}

pub async fn logout() -> impl IntoResponse {
    let cookie = clear_auth_cookie();
    let mut response = (StatusCode::OK, "OK").into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
    response
}

/// Role-specific slice of the profile view. A new role cannot be added
/// without deciding what its view carries.
#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleView {
    Donor {
        stats: UserDonationStats,
    },
    Recipient {
        profile: Option<RecipientProfile>,
        #[serde(rename = "verificationStatus")]
        verification_status: Option<VerificationStatus>,
    },
}

#[derive(Serialize)]
pub struct MeResponse {
    user: UserProfile,
    #[serde(flatten)]
    view: RoleView,
    settings: UserSettings,
}

pub async fn me(State(state): State<AppState>, user: AuthenticatedUser) -> impl IntoResponse {
    let role = match db::get_user_role(&state.db, &user.id).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Role lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let settings = match db::get_user_settings(&state.db, &user.id).await {
        Ok(s) => s.unwrap_or_else(|| UserSettings::default_for(&user.id)),
        Err(e) => {
            tracing::error!("Settings lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let view = match role.as_ref().map(|r| r.role).unwrap_or(Role::Donor) {
        Role::Donor => {
            let stats = match db::get_user_stats(&state.db, &user.id).await {
                Ok(s) => s.unwrap_or(UserDonationStats {
                    user_id: user.id.clone(),
                    total_donations: 0.0,
                    donation_count: 0,
                    recent_donations: Vec::new(),
                }),
                Err(e) => {
                    tracing::error!("Stats lookup failed: {}", e);
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
                }
            };
            RoleView::Donor { stats }
        }
        Role::Recipient => {
            let profile = match db::get_recipient_profile(&state.db, &user.id).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!("Recipient profile lookup failed: {}", e);
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
                }
            };
            RoleView::Recipient {
                profile,
                verification_status: role.and_then(|r| r.verification_status),
            }
        }
    };

    let profile = UserProfile {
        id: user.id,
        email: user.email,
        name: user.name,
        provider: user.provider,
    };

    Json(MeResponse {
        user: profile,
        view,
        settings,
    })
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub is_anonymous_donation: Option<bool>,
    pub email_notifications: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub settings: Option<SettingsUpdate>,
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateMeRequest>,
) -> impl IntoResponse {
    if let Some(name) = payload.name.as_deref() {
        let identity = IdentityClient::new(state.config.identity.clone());
        if let Err(e) = identity.update_display_name(&user.id, name).await {
            tracing::error!("Profile update failed: {}", e);
            return (StatusCode::BAD_GATEWAY, "Profile update failed").into_response();
        }
    }

    if let Some(update) = payload.settings {
        let mut settings = match db::get_user_settings(&state.db, &user.id).await {
            Ok(s) => s.unwrap_or_else(|| UserSettings::default_for(&user.id)),
            Err(e) => {
                tracing::error!("Settings lookup failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
            }
        };
        if let Some(v) = update.is_anonymous_donation {
            settings.is_anonymous_donation = v;
        }
        if let Some(v) = update.email_notifications {
            settings.email_notifications = v;
        }
        if let Err(e) = db::put_user_settings(&state.db, &settings).await {
            tracing::error!("Settings write failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    (StatusCode::OK, "OK").into_response()
}

pub fn create_jwt(user: &UserProfile) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(1))
        .expect("valid timestamp")
        .timestamp();

    let issuer = env::var("JWT_ISSUER").ok();
    let audience = env::var("JWT_AUDIENCE").ok();

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        provider: user.provider.clone(),
        name: user.name.clone(),
        exp: expiration as usize,
        iss: issuer,
        aud: audience,
    };

    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if auth_header.starts_with("Bearer ") {
            return Some(auth_header[7..].to_string());
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|h| h.to_str().ok()) {
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some((k, v)) = cookie.split_once('=') {
                if k == AUTH_COOKIE_NAME {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

pub fn validate_token_str(token: &str) -> anyhow::Result<Claims> {
    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

    let mut validation = Validation::default();
    validation.validate_exp = true;
    if let Ok(issuer) = env::var("JWT_ISSUER") {
        validation.set_issuer(&[issuer.as_str()]);
    }
    if let Ok(audience) = env::var("JWT_AUDIENCE") {
        validation.set_audience(&[audience.as_str()]);
    }

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;
    Ok(data.claims)
}

fn build_auth_cookie(token: &str) -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=86400",
        AUTH_COOKIE_NAME, token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie() -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        AUTH_COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

struct ProviderConfig {
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    redirect_url: String,
}

fn load_provider_config(provider: &str) -> Result<ProviderConfig, String> {
    let allowed = env::var("OAUTH_PROVIDERS").unwrap_or_default();
    let allowed_list: Vec<String> = allowed
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if allowed_list.is_empty() || !allowed_list.contains(&provider.to_lowercase()) {
        return Err("OAuth provider not allowed".to_string());
    }

    let prefix = provider.to_uppercase();
    let client_id =
        env::var(format!("{}_CLIENT_ID", prefix)).map_err(|_| "Missing client id".to_string())?;
    let client_secret = env::var(format!("{}_CLIENT_SECRET", prefix))
        .map_err(|_| "Missing client secret".to_string())?;
    let auth_url =
        env::var(format!("{}_AUTH_URL", prefix)).map_err(|_| "Missing auth url".to_string())?;
    let token_url =
        env::var(format!("{}_TOKEN_URL", prefix)).map_err(|_| "Missing token url".to_string())?;
    let userinfo_url = env::var(format!("{}_USERINFO_URL", prefix))
        .map_err(|_| "Missing userinfo url".to_string())?;
    let redirect_url = env::var(format!("{}_REDIRECT_URL", prefix))
        .unwrap_or_else(|_| format!("http://localhost:8080/auth/callback/{}", provider));

    Ok(ProviderConfig {
        client_id,
        client_secret,
        auth_url,
        token_url,
        userinfo_url,
        redirect_url,
    })
}

fn create_state_token(provider: &str) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::minutes(10))
        .expect("valid timestamp")
        .timestamp();
    let state = StateClaims {
        exp: expiration as usize,
        provider: provider.to_string(),
        nonce: uuid::Uuid::new_v4().to_string(),
    };
    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let token = encode(
        &Header::default(),
        &state,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}

fn validate_state_token(token: &str, provider: &str) -> anyhow::Result<()> {
    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<StateClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;
    if data.claims.provider.to_lowercase() != provider.to_lowercase() {
        return Err(anyhow::anyhow!("provider mismatch"));
    }
    Ok(())
}

struct FederatedProfile {
    id: String,
    email: String,
    name: String,
}

async fn fetch_user_profile(
    userinfo_url: &str,
    access_token: &str,
) -> anyhow::Result<FederatedProfile> {
    let client = reqwest::Client::new();
    let resp = client
        .get(userinfo_url)
        .bearer_auth(access_token)
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(anyhow::anyhow!("userinfo response status {}", resp.status()));
    }

    let json: Value = resp.json().await?;
    let id = json
        .get("sub")
        .or_else(|| json.get("id"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing user id"))?
        .to_string();
    let email = json
        .get("email")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown@example.com")
        .to_string();
    let name = json
        .get("name")
        .or_else(|| json.get("login"))
        .and_then(|v| v.as_str())
        .unwrap_or("User")
        .to_string();

    Ok(FederatedProfile { id, email, name })
}
