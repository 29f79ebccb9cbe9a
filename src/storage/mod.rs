mod avatar;
mod object_storage;

pub use avatar::{
    avatar_bucket_policy, AvatarService, AVATAR_CONTENT_TYPES, DEFAULT_AVATAR_MAX_SIZE_BYTES,
};
pub use object_storage::{BucketPolicy, FsObjectStorage, ObjectStorage, StorageError};
