/// Opaque unsigned 64-bit identity used for every persisted entity (§3).
///
/// `0` is reserved to mean "global"/"none" where the data model calls for it
/// (e.g. `Route.projectId = 0` means the global namespace).
pub type Id = u64;
