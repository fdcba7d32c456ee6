//! Distributed binary metadata for model graphs

pub mod codec;
pub mod deserializer;
pub mod error;
pub mod files;
pub mod metadata;
pub mod obj;
pub mod serializer;
pub mod string_cache;
pub mod string_index;


pub use codec::IndexEntry;
pub use deserializer::{DeserializerBuilder, DistributedBinaryGraphDeserializer};
pub use error::{Result, SerializationError};
pub use files::{DirectoryFileReader, DirectoryFileWriter, FileReader, FileWriter, InMemoryFiles};
pub use metadata::MetadataSpecification;
pub use obj::{Identifiers, Obj, ObjBuilder, PropertyValues, RValue};
pub use serializer::{DistributedBinaryGraphSerializer, SerializationSummary, SerializerOptions};
pub use string_cache::{CacheKind, StringCache, StringCacheBuilder};
pub use string_index::{EagerStringIndex, LazyStringIndex, StringIndex};
