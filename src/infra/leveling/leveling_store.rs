// Implementations of the leveling ports.

pub mod in_memory;
pub mod role_granter;
pub mod sqlite_store;

pub use in_memory::InMemoryLevelingStore;
pub use role_granter::DiscordRoleGranter;
pub use sqlite_store::SqliteLevelingStore;
