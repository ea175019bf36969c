/// What to answer for an empty top-level batch (`[]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyBatchPolicy {
    /// A single Invalid Request error with `id: null`
    #[default]
    InvalidRequest,
    /// Nothing at all, as for a batch of notifications
    NoResponse,
}

/// Configuration of the dispatch pipeline
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    pub empty_batch: EmptyBatchPolicy,
    /// Batches longer than this are rejected as a whole; `None` means unbounded
    pub max_batch_size: Option<usize>,
}

impl DispatchConfig {
    pub fn with_empty_batch(mut self, policy: EmptyBatchPolicy) -> Self {
        self.empty_batch = policy;
        self
    }

    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_config_default() {
        let config = DispatchConfig::default();
        assert_eq!(config.empty_batch, EmptyBatchPolicy::InvalidRequest);
        assert!(config.max_batch_size.is_none());

        let config = config
            .with_empty_batch(EmptyBatchPolicy::NoResponse)
            .with_max_batch_size(8);
        assert_eq!(config.empty_batch, EmptyBatchPolicy::NoResponse);
        assert_eq!(config.max_batch_size, Some(8));
    }
}
