//! Registry capability ports.
//!
//! Each registry resource family is a `ResourceKind` marker type carrying
//! its DTO types and URL scope. `ResourceApi<K>` is the per-kind CRUD port
//! and `ModelRegistry` bundles the five kinds the workflows need. The HTTP
//! adapter lives in `regorch-infra`.

use regorch_types::error::RegistryError;
use regorch_types::registry::{
    InferenceService, InferenceServiceCreate, InferenceServiceUpdate, Lookup, ModelVersion,
    ModelVersionCreate, ModelVersionUpdate, RegisteredModel, RegisteredModelCreate,
    RegisteredModelUpdate, ServeModel, ServeModelCreate, ServeModelUpdate, ServingEnvironment,
    ServingEnvironmentCreate, ServingEnvironmentUpdate,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A registry resource family.
pub trait ResourceKind: Send + Sync + 'static {
    /// Collection name, used for logging and as the last path segment.
    const NAME: &'static str;

    type Create: Serialize + Send + Sync;
    type Update: Serialize + Send + Sync;
    type Resource: Serialize + DeserializeOwned + Send;
    /// Scope the collection lives under: `()` for top-level collections,
    /// the owning inference-service id for serves.
    type Parent: Send + Sync;

    /// Path segments of the collection, relative to the registry base URL.
    fn collection_segments(parent: &Self::Parent) -> Vec<String>;
}

pub struct RegisteredModels;
pub struct ModelVersions;
pub struct ServingEnvironments;
pub struct InferenceServices;
pub struct ServeModels;

impl ResourceKind for RegisteredModels {
    const NAME: &'static str = "registered_models";
    type Create = RegisteredModelCreate;
    type Update = RegisteredModelUpdate;
    type Resource = RegisteredModel;
    type Parent = ();

    fn collection_segments(_: &()) -> Vec<String> {
        vec![Self::NAME.to_string()]
    }
}

impl ResourceKind for ModelVersions {
    const NAME: &'static str = "model_versions";
    type Create = ModelVersionCreate;
    type Update = ModelVersionUpdate;
    type Resource = ModelVersion;
    type Parent = ();

    fn collection_segments(_: &()) -> Vec<String> {
        vec![Self::NAME.to_string()]
    }
}

impl ResourceKind for ServingEnvironments {
    const NAME: &'static str = "serving_environments";
    type Create = ServingEnvironmentCreate;
    type Update = ServingEnvironmentUpdate;
    type Resource = ServingEnvironment;
    type Parent = ();

    fn collection_segments(_: &()) -> Vec<String> {
        vec![Self::NAME.to_string()]
    }
}

impl ResourceKind for InferenceServices {
    const NAME: &'static str = "inference_services";
    type Create = InferenceServiceCreate;
    type Update = InferenceServiceUpdate;
    type Resource = InferenceService;
    type Parent = ();

    fn collection_segments(_: &()) -> Vec<String> {
        vec![Self::NAME.to_string()]
    }
}

impl ResourceKind for ServeModels {
    const NAME: &'static str = "serves";
    type Create = ServeModelCreate;
    type Update = ServeModelUpdate;
    type Resource = ServeModel;
    /// Id of the inference service the serve belongs to.
    type Parent = String;

    fn collection_segments(inference_service_id: &String) -> Vec<String> {
        vec![
            InferenceServices::NAME.to_string(),
            inference_service_id.clone(),
            Self::NAME.to_string(),
        ]
    }
}

/// CRUD port for one resource kind.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ResourceApi<K: ResourceKind>: Send + Sync {
    /// Create a resource. Not idempotent on the registry side.
    fn create(
        &self,
        parent: &K::Parent,
        dto: &K::Create,
    ) -> impl std::future::Future<Output = Result<K::Resource, RegistryError>> + Send;

    /// Fetch a resource by id. A 404 reads as `None`.
    fn get(
        &self,
        parent: &K::Parent,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<K::Resource>, RegistryError>> + Send;

    /// Look up a single resource by name or external id.
    fn find(
        &self,
        parent: &K::Parent,
        lookup: &Lookup,
    ) -> impl std::future::Future<Output = Result<Option<K::Resource>, RegistryError>> + Send;

    /// Partially update a resource.
    fn update(
        &self,
        parent: &K::Parent,
        id: &str,
        patch: &K::Update,
    ) -> impl std::future::Future<Output = Result<K::Resource, RegistryError>> + Send;
}

/// Everything the workflow chains need from the registry.
pub trait ModelRegistry:
    ResourceApi<RegisteredModels>
    + ResourceApi<ModelVersions>
    + ResourceApi<ServingEnvironments>
    + ResourceApi<InferenceServices>
    + ResourceApi<ServeModels>
{
}

impl<T> ModelRegistry for T where
    T: ResourceApi<RegisteredModels>
        + ResourceApi<ModelVersions>
        + ResourceApi<ServingEnvironments>
        + ResourceApi<InferenceServices>
        + ResourceApi<ServeModels>
{
}
