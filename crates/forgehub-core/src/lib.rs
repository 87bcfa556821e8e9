pub mod archive;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod error;
pub mod forge;
pub mod http;
pub mod packager;

pub use buffer::ModuleBuffer;
pub use cache::{BufferingCache, ContentCache, InMemoryCache, NoOpCache};
pub use config::{ForgeConfig, RegistryConfig};
pub use error::{ForgeError, Result};
pub use forge::{
    DirectoryForge, Forge, ModuleIndex, ModuleQuery, MultiForge, NexusForge, ProxyForge,
    ReleaseFilter, SourceForge,
};
pub use http::{HttpClient, HttpError, ReqwestHttpClient};
pub use packager::{DependencyPackager, PackManifest};

pub use forgehub_models as models;
