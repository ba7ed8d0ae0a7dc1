#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// `None` when the listing entry carries no name.
    pub function_name: Option<String>,
    /// Log group from the function's logging configuration, if it has one.
    pub log_group_name: Option<String>,
    pub architectures: Vec<String>,
}

pub trait FunctionCatalog {
    /// Every function deployed in `region`, across all listing pages.
    fn list_functions(&self, region: &str) -> Result<Vec<FunctionDescriptor>, String>;
}
