//! # Activation Key Methods
//!
//! Method-call surface for activation keys. Every method is a `POST` with
//! a JSON body of named parameters; the caller's organization comes from
//! the bearer credential, never from the body.
//!
//! ## Endpoints
//!
//! - `POST /rpc/activationkey.create`: Create a key, returns its token
//! - `POST /rpc/activationkey.delete`: Delete a key
//! - `POST /rpc/activationkey.getDetails`: Key details record
//! - `POST /rpc/activationkey.setDetails`: Partial update of scalar details
//! - `POST /rpc/activationkey.listActivationKeys`: All keys of the org
//! - `POST /rpc/activationkey.listActivatedSystems`: Systems registered with a key
//! - `POST /rpc/activationkey.activateSystem`: Register a system (quota enforced)
//! - `POST /rpc/activationkey.addChildChannels`       / `removeChildChannels`
//! - `POST /rpc/activationkey.addEntitlements`        / `removeEntitlements`
//! - `POST /rpc/activationkey.addPackageNames`        / `removePackageNames`
//! - `POST /rpc/activationkey.addPackages`            / `removePackages`
//! - `POST /rpc/activationkey.addServerGroups`        / `removeServerGroups`
//! - `POST /rpc/activationkey.listConfigChannels`
//! - `POST /rpc/activationkey.setConfigChannels`      / `addConfigChannels` / `removeConfigChannels`
//! - `POST /rpc/activationkey.enableConfigDeployment` / `disableConfigDeployment`
//! - `POST /rpc/activationkey.checkConfigDeployment`
//!
//! Mutations answer `1`. Package mutations answer `1` when the key changed
//! and `0` otherwise.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use akm_catalog::ConfigChannel;
use akm_core::{ServerGroupId, SystemId};
use akm_state::{ActivatedSystem, KeyDetails, KeyDetailsUpdate, NewKey, PackageSpec};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{
    extract_validated_json, require_key, require_keys, require_labels, Validate,
};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Parameters of `activationkey.create`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CreateKeyRequest {
    /// Explicit key, or empty for a generated token.
    pub key: String,
    /// Free-form description.
    pub description: String,
    /// Base channel label, or empty for none.
    pub base_channel_label: String,
    /// Usage limit. Absent means unlimited.
    pub usage_limit: Option<i64>,
    /// Add-on entitlement labels.
    pub entitlements: Vec<String>,
    /// Make this the organization's universal default.
    pub universal_default: bool,
}

impl Validate for CreateKeyRequest {
    fn validate(&self) -> Result<(), String> {
        require_labels(&self.entitlements, "entitlements")
    }
}

impl From<CreateKeyRequest> for NewKey {
    fn from(r: CreateKeyRequest) -> Self {
        NewKey {
            key: r.key,
            description: r.description,
            base_channel_label: r.base_channel_label,
            usage_limit: r.usage_limit,
            entitlements: r.entitlements,
            universal_default: r.universal_default,
        }
    }
}

/// A single key.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct KeyRequest {
    /// Key token.
    pub key: String,
}

impl Validate for KeyRequest {
    fn validate(&self) -> Result<(), String> {
        require_key(&self.key)
    }
}

/// Partial update of a key's scalar details. Absent fields are untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DetailsUpdate {
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New base channel. Empty clears the base and its children.
    #[serde(default)]
    pub base_channel_label: Option<String>,
    /// New usage limit.
    #[serde(default)]
    pub usage_limit: Option<i64>,
    /// `true` removes the limit, overriding `usage_limit`.
    #[serde(default)]
    pub unlimited_usage_limit: Option<bool>,
    /// Set or clear the universal default flag.
    #[serde(default)]
    pub universal_default: Option<bool>,
}

impl From<DetailsUpdate> for KeyDetailsUpdate {
    fn from(d: DetailsUpdate) -> Self {
        KeyDetailsUpdate {
            description: d.description,
            base_channel_label: d.base_channel_label,
            usage_limit: d.usage_limit,
            unlimited_usage_limit: d.unlimited_usage_limit,
            universal_default: d.universal_default,
        }
    }
}

/// Parameters of `activationkey.setDetails`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SetDetailsRequest {
    /// Key token.
    pub key: String,
    /// Fields to change.
    pub details: DetailsUpdate,
}

impl Validate for SetDetailsRequest {
    fn validate(&self) -> Result<(), String> {
        require_key(&self.key)
    }
}

/// Child channel labels applied to several keys.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChildChannelsRequest {
    /// Key tokens.
    pub keys: Vec<String>,
    /// Child channel labels.
    pub channel_labels: Vec<String>,
}

impl Validate for ChildChannelsRequest {
    fn validate(&self) -> Result<(), String> {
        require_keys(&self.keys)
    }
}

/// Add-on entitlement labels for one key.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct EntitlementsRequest {
    /// Key token.
    pub key: String,
    /// Add-on entitlement labels.
    pub entitlements: Vec<String>,
}

impl Validate for EntitlementsRequest {
    fn validate(&self) -> Result<(), String> {
        require_key(&self.key)?;
        require_labels(&self.entitlements, "entitlements")
    }
}

/// Package names without architecture.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PackageNamesRequest {
    /// Key token.
    pub key: String,
    /// Package names.
    pub package_names: Vec<String>,
}

impl Validate for PackageNamesRequest {
    fn validate(&self) -> Result<(), String> {
        require_key(&self.key)
    }
}

/// A package, optionally constrained to an architecture.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PackageInput {
    /// Package name.
    pub name: String,
    /// Architecture label. Absent or empty means any.
    #[serde(default)]
    pub arch: Option<String>,
}

/// Packages for one key.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PackagesRequest {
    /// Key token.
    pub key: String,
    /// Packages.
    pub packages: Vec<PackageInput>,
}

impl Validate for PackagesRequest {
    fn validate(&self) -> Result<(), String> {
        require_key(&self.key)
    }
}

/// Server group ids for one key.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ServerGroupsRequest {
    /// Key token.
    pub key: String,
    /// Server group ids.
    pub server_group_ids: Vec<u64>,
}

impl Validate for ServerGroupsRequest {
    fn validate(&self) -> Result<(), String> {
        require_key(&self.key)
    }
}

/// Configuration channel labels applied to several keys.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ConfigChannelsRequest {
    /// Key tokens.
    pub keys: Vec<String>,
    /// Configuration channel labels, in rank order.
    pub config_channel_labels: Vec<String>,
    /// `addConfigChannels` only: prepend instead of append.
    #[serde(default)]
    pub add_to_top: bool,
}

impl Validate for ConfigChannelsRequest {
    fn validate(&self) -> Result<(), String> {
        require_keys(&self.keys)
    }
}

/// Parameters of `activationkey.activateSystem`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ActivateSystemRequest {
    /// Key token.
    pub key: String,
    /// System being registered.
    pub system_id: u64,
    /// System name.
    #[serde(default)]
    pub name: String,
}

impl Validate for ActivateSystemRequest {
    fn validate(&self) -> Result<(), String> {
        require_key(&self.key)
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Key details record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KeyDetailsResponse {
    /// Key token.
    pub key: String,
    /// Description.
    pub description: String,
    /// Usage limit. Omitted when unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u64>,
    /// Base channel. Omitted when none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_channel_label: Option<String>,
    /// Child channel labels.
    pub child_channel_labels: Vec<String>,
    /// Entitlement labels, base and add-on.
    pub entitlements: Vec<String>,
    /// Server group ids.
    pub server_group_ids: Vec<u64>,
    /// Package presets as `name` or `name.arch`.
    pub package_names: Vec<String>,
    /// Whether this is the organization's universal default.
    pub universal_default: bool,
    /// Whether configuration files are deployed at registration.
    pub config_deploy: bool,
    /// Creation time, RFC 3339.
    pub created: String,
}

impl From<KeyDetails> for KeyDetailsResponse {
    fn from(d: KeyDetails) -> Self {
        Self {
            key: d.key,
            description: d.description,
            usage_limit: d.usage_limit,
            base_channel_label: d.base_channel_label,
            child_channel_labels: d.child_channel_labels,
            entitlements: d.entitlements,
            server_group_ids: d.server_group_ids,
            package_names: d.package_names,
            universal_default: d.universal_default,
            config_deploy: d.config_deploy,
            created: d.created.to_iso8601(),
        }
    }
}

/// A system registered with a key.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivatedSystemResponse {
    /// System id.
    pub system_id: u64,
    /// System name.
    pub name: String,
    /// Registration time, RFC 3339.
    pub activated: String,
}

impl From<ActivatedSystem> for ActivatedSystemResponse {
    fn from(s: ActivatedSystem) -> Self {
        Self {
            system_id: s.system_id.get(),
            name: s.name,
            activated: s.activated.to_iso8601(),
        }
    }
}

/// A configuration channel.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfigChannelResponse {
    /// Label.
    pub label: String,
    /// Display name.
    pub name: String,
}

impl From<ConfigChannel> for ConfigChannelResponse {
    fn from(c: ConfigChannel) -> Self {
        Self {
            label: c.label,
            name: c.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the activation key router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rpc/activationkey.create", post(create))
        .route("/rpc/activationkey.delete", post(delete))
        .route("/rpc/activationkey.getDetails", post(get_details))
        .route("/rpc/activationkey.setDetails", post(set_details))
        .route("/rpc/activationkey.listActivationKeys", post(list_activation_keys))
        .route(
            "/rpc/activationkey.listActivatedSystems",
            post(list_activated_systems),
        )
        .route("/rpc/activationkey.activateSystem", post(activate_system))
        .route("/rpc/activationkey.addChildChannels", post(add_child_channels))
        .route(
            "/rpc/activationkey.removeChildChannels",
            post(remove_child_channels),
        )
        .route("/rpc/activationkey.addEntitlements", post(add_entitlements))
        .route("/rpc/activationkey.removeEntitlements", post(remove_entitlements))
        .route("/rpc/activationkey.addPackageNames", post(add_package_names))
        .route(
            "/rpc/activationkey.removePackageNames",
            post(remove_package_names),
        )
        .route("/rpc/activationkey.addPackages", post(add_packages))
        .route("/rpc/activationkey.removePackages", post(remove_packages))
        .route("/rpc/activationkey.addServerGroups", post(add_server_groups))
        .route("/rpc/activationkey.removeServerGroups", post(remove_server_groups))
        .route("/rpc/activationkey.listConfigChannels", post(list_config_channels))
        .route("/rpc/activationkey.setConfigChannels", post(set_config_channels))
        .route("/rpc/activationkey.addConfigChannels", post(add_config_channels))
        .route(
            "/rpc/activationkey.removeConfigChannels",
            post(remove_config_channels),
        )
        .route(
            "/rpc/activationkey.enableConfigDeployment",
            post(enable_config_deployment),
        )
        .route(
            "/rpc/activationkey.disableConfigDeployment",
            post(disable_config_deployment),
        )
        .route(
            "/rpc/activationkey.checkConfigDeployment",
            post(check_config_deployment),
        )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

type Body<T> = Result<Json<T>, JsonRejection>;

fn flag(modified: bool) -> Json<i32> {
    Json(i32::from(modified))
}

/// Create an activation key.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.create",
    request_body = CreateKeyRequest,
    responses(
        (status = 200, description = "Token of the new key", body = String),
        (status = 409, description = "Key already exists", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid channel, entitlement or limit", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn create(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<CreateKeyRequest>,
) -> Result<Json<String>, AppError> {
    let req = extract_validated_json(body)?;
    let token = state.keys.create(identity.caller(), &NewKey::from(req))?;
    Ok(Json(token.to_string()))
}

/// Delete an activation key.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.delete",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Key deleted", body = i32),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn delete(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<KeyRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state.keys.delete(identity.caller(), &req.key)?;
    Ok(Json(1))
}

/// Details of one key.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.getDetails",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Key details", body = KeyDetailsResponse),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn get_details(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<KeyRequest>,
) -> Result<Json<KeyDetailsResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let details = state.keys.get_details(identity.caller(), &req.key)?;
    Ok(Json(details.into()))
}

/// Update scalar details of a key.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.setDetails",
    request_body = SetDetailsRequest,
    responses(
        (status = 200, description = "Details updated", body = i32),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid base channel or limit", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn set_details(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<SetDetailsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    let update = KeyDetailsUpdate::from(req.details);
    state.keys.set_details(identity.caller(), &req.key, &update)?;
    Ok(Json(1))
}

/// All keys of the caller's organization, ordered by token.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.listActivationKeys",
    responses(
        (status = 200, description = "Keys", body = Vec<KeyDetailsResponse>),
    ),
    tag = "activationkey"
)]
pub(crate) async fn list_activation_keys(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> Result<Json<Vec<KeyDetailsResponse>>, AppError> {
    let keys = state.keys.list_activation_keys(identity.caller())?;
    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// Systems registered with a key, in activation order.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.listActivatedSystems",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Activated systems", body = Vec<ActivatedSystemResponse>),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn list_activated_systems(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<KeyRequest>,
) -> Result<Json<Vec<ActivatedSystemResponse>>, AppError> {
    let req = extract_validated_json(body)?;
    let systems = state.keys.list_activated_systems(identity.caller(), &req.key)?;
    Ok(Json(systems.into_iter().map(Into::into).collect()))
}

/// Register a system with a key, enforcing its usage limit.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.activateSystem",
    request_body = ActivateSystemRequest,
    responses(
        (status = 200, description = "System activated", body = i32),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
        (status = 409, description = "Usage limit reached", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn activate_system(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<ActivateSystemRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state.keys.activate_system(
        identity.caller(),
        &req.key,
        SystemId::new(req.system_id),
        &req.name,
    )?;
    Ok(Json(1))
}

/// Add child channels to keys.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.addChildChannels",
    request_body = ChildChannelsRequest,
    responses(
        (status = 200, description = "Channels added", body = i32),
        (status = 422, description = "Channel does not belong to the key's base", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn add_child_channels(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<ChildChannelsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state
        .keys
        .add_child_channels(identity.caller(), &req.keys, &req.channel_labels)?;
    Ok(Json(1))
}

/// Remove child channels from keys.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.removeChildChannels",
    request_body = ChildChannelsRequest,
    responses(
        (status = 200, description = "Channels removed", body = i32),
        (status = 422, description = "Channel does not belong to the key's base", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn remove_child_channels(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<ChildChannelsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state
        .keys
        .remove_child_channels(identity.caller(), &req.keys, &req.channel_labels)?;
    Ok(Json(1))
}

/// Add add-on entitlements to a key.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.addEntitlements",
    request_body = EntitlementsRequest,
    responses(
        (status = 200, description = "Entitlements added", body = i32),
        (status = 422, description = "Unknown or non-add-on entitlement", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn add_entitlements(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<EntitlementsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state
        .keys
        .add_entitlements(identity.caller(), &req.key, &req.entitlements)?;
    Ok(Json(1))
}

/// Remove add-on entitlements from a key.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.removeEntitlements",
    request_body = EntitlementsRequest,
    responses(
        (status = 200, description = "Entitlements removed", body = i32),
        (status = 422, description = "Unknown or non-add-on entitlement", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn remove_entitlements(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<EntitlementsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state
        .keys
        .remove_entitlements(identity.caller(), &req.key, &req.entitlements)?;
    Ok(Json(1))
}

/// Add package presets by name.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.addPackageNames",
    request_body = PackageNamesRequest,
    responses(
        (status = 200, description = "1 if the key changed, else 0", body = i32),
        (status = 422, description = "Key lacks provisioning", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn add_package_names(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<PackageNamesRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    let modified = state
        .keys
        .add_package_names(identity.caller(), &req.key, &req.package_names)?;
    Ok(flag(modified))
}

/// Remove package presets by name.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.removePackageNames",
    request_body = PackageNamesRequest,
    responses(
        (status = 200, description = "1 if the key changed, else 0", body = i32),
        (status = 422, description = "Key lacks provisioning", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn remove_package_names(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<PackageNamesRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    let modified = state
        .keys
        .remove_package_names(identity.caller(), &req.key, &req.package_names)?;
    Ok(flag(modified))
}

fn package_specs(packages: Vec<PackageInput>) -> Vec<PackageSpec> {
    packages
        .into_iter()
        .map(|p| PackageSpec {
            name: p.name,
            arch: p.arch,
        })
        .collect()
}

/// Add package presets with optional architecture.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.addPackages",
    request_body = PackagesRequest,
    responses(
        (status = 200, description = "1 if the key changed, else 0", body = i32),
        (status = 422, description = "Key lacks provisioning or unknown architecture", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn add_packages(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<PackagesRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    let specs = package_specs(req.packages);
    let modified = state.keys.add_packages(identity.caller(), &req.key, &specs)?;
    Ok(flag(modified))
}

/// Remove package presets matching exactly on name and architecture.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.removePackages",
    request_body = PackagesRequest,
    responses(
        (status = 200, description = "1 if the key changed, else 0", body = i32),
        (status = 422, description = "Key lacks provisioning", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn remove_packages(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<PackagesRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    let specs = package_specs(req.packages);
    let modified = state
        .keys
        .remove_packages(identity.caller(), &req.key, &specs)?;
    Ok(flag(modified))
}

fn group_ids(ids: &[u64]) -> Vec<ServerGroupId> {
    ids.iter().copied().map(ServerGroupId::new).collect()
}

/// Add server groups to a key.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.addServerGroups",
    request_body = ServerGroupsRequest,
    responses(
        (status = 200, description = "Groups added", body = i32),
        (status = 404, description = "Key or server group not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn add_server_groups(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<ServerGroupsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state.keys.add_server_groups(
        identity.caller(),
        &req.key,
        &group_ids(&req.server_group_ids),
    )?;
    Ok(Json(1))
}

/// Remove server groups from a key.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.removeServerGroups",
    request_body = ServerGroupsRequest,
    responses(
        (status = 200, description = "Groups removed", body = i32),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn remove_server_groups(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<ServerGroupsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state.keys.remove_server_groups(
        identity.caller(),
        &req.key,
        &group_ids(&req.server_group_ids),
    )?;
    Ok(Json(1))
}

/// Configuration channels of a key in rank order.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.listConfigChannels",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Configuration channels", body = Vec<ConfigChannelResponse>),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn list_config_channels(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<KeyRequest>,
) -> Result<Json<Vec<ConfigChannelResponse>>, AppError> {
    let req = extract_validated_json(body)?;
    let channels = state.keys.list_config_channels(identity.caller(), &req.key)?;
    Ok(Json(channels.into_iter().map(Into::into).collect()))
}

/// Replace the configuration channels of keys.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.setConfigChannels",
    request_body = ConfigChannelsRequest,
    responses(
        (status = 200, description = "Channels set", body = i32),
        (status = 422, description = "Unknown configuration channel", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn set_config_channels(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<ConfigChannelsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state
        .keys
        .set_config_channels(identity.caller(), &req.keys, &req.config_channel_labels)?;
    Ok(Json(1))
}

/// Add configuration channels to keys, ranked last or at the top.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.addConfigChannels",
    request_body = ConfigChannelsRequest,
    responses(
        (status = 200, description = "Channels added", body = i32),
        (status = 422, description = "Unknown configuration channel", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn add_config_channels(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<ConfigChannelsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state.keys.add_config_channels(
        identity.caller(),
        &req.keys,
        &req.config_channel_labels,
        req.add_to_top,
    )?;
    Ok(Json(1))
}

/// Remove configuration channels from keys.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.removeConfigChannels",
    request_body = ConfigChannelsRequest,
    responses(
        (status = 200, description = "Channels removed", body = i32),
        (status = 422, description = "Unknown configuration channel", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn remove_config_channels(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<ConfigChannelsRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state
        .keys
        .remove_config_channels(identity.caller(), &req.keys, &req.config_channel_labels)?;
    Ok(Json(1))
}

/// Deploy configuration files at registration.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.enableConfigDeployment",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Deployment enabled", body = i32),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn enable_config_deployment(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<KeyRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state
        .keys
        .enable_config_deployment(identity.caller(), &req.key)?;
    Ok(Json(1))
}

/// Stop deploying configuration files at registration.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.disableConfigDeployment",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Deployment disabled", body = i32),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn disable_config_deployment(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<KeyRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    state
        .keys
        .disable_config_deployment(identity.caller(), &req.key)?;
    Ok(Json(1))
}

/// `1` if configuration deployment is enabled, else `0`.
#[utoipa::path(
    post,
    path = "/rpc/activationkey.checkConfigDeployment",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "1 if enabled, else 0", body = i32),
        (status = 404, description = "Key not found", body = crate::error::ErrorBody),
    ),
    tag = "activationkey"
)]
pub(crate) async fn check_config_deployment(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Body<KeyRequest>,
) -> Result<Json<i32>, AppError> {
    let req = extract_validated_json(body)?;
    let enabled = state
        .keys
        .check_config_deployment(identity.caller(), &req.key)?;
    Ok(flag(enabled))
}
