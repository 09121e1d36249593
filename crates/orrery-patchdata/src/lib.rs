//! Streaming of per-patch heightmap and color data.
//!
//! A [`PatchDataStore`] answers every request immediately, with the patch's
//! own texture when it is resident, otherwise with the closest loaded
//! ancestor's texture and the `(scale, offset)` window into it. Loads run on
//! the background threads of a shared [`LoaderPool`] and their results are
//! drained on the simulation thread by [`PatchDataStore::poll`].

mod error;
mod filter;
mod loader;
mod params;
mod pool;
mod source;
mod store;
mod texture;

pub use error::LoadError;
pub use filter::sample_height;
pub use loader::{DataLoader, LoadRequest, SourceLoader};
pub use params::{HeightmapPatchParams, ParamBlockTable};
pub use pool::{LoadJob, LoadResult, LoaderPool};
pub use source::{ProceduralParams, TextureSource};
pub use store::{DataLayer, DataStats, Fallback, PatchDataStore, ResolvedTexture};
pub use texture::{HeightStats, PatchTexture, TexelData};
