pub trait RegionDirectory {
    /// Regions whose opt-in status is enabled for the calling account.
    fn enabled_regions(&self) -> Result<Vec<String>, String>;
}
