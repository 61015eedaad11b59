/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use crate::behavior::CommandKind;
use crate::errors::{FluteError, Result};
use crate::interceptor::{FluteInterceptor, InterceptorChain, InterceptorConfigItem};

/// Interceptor builder
pub struct InterceptorBuilder {
    interceptors: HashMap<String, (Arc<dyn FluteInterceptor>, InterceptorConfigItem)>,
}

impl Default for InterceptorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptorBuilder {
    pub fn new() -> Self {
        Self {
            interceptors: HashMap::new(),
        }
    }

    /// Registers an interceptor, disabled until `enable` is called.
    pub fn register(mut self, interceptor: Arc<dyn FluteInterceptor>) -> Self {
        let name = interceptor.name().to_string();

        let config_item = InterceptorConfigItem {
            enabled: false,
            order: interceptor.order(),
            ignored_tables: HashSet::new(),
            supported_kinds: HashSet::new(),
        };

        self.interceptors.insert(name, (interceptor, config_item));
        self
    }

    pub fn register_instance<I>(self, interceptor: I) -> Self
    where
        I: FluteInterceptor + 'static,
    {
        self.register(Arc::new(interceptor))
    }

    fn config_mut(&mut self, name: &str) -> Result<&mut InterceptorConfigItem> {
        self.interceptors
            .get_mut(name)
            .map(|(_, config)| config)
            .ok_or_else(|| FluteError::ConfigError(format!("Interceptor '{}' not found", name)))
    }

    pub fn enable(mut self, name: &str) -> Result<Self> {
        self.config_mut(name)?.enabled = true;
        Ok(self)
    }

    pub fn disable(mut self, name: &str) -> Result<Self> {
        self.config_mut(name)?.enabled = false;
        Ok(self)
    }

    pub fn with_order(mut self, name: &str, order: i32) -> Result<Self> {
        self.config_mut(name)?.order = order;
        Ok(self)
    }

    pub fn ignore_table(mut self, name: &str, table: &str) -> Result<Self> {
        self.config_mut(name)?.ignored_tables.insert(table.to_string());
        Ok(self)
    }

    /// Restrict the interceptor to some command kinds
    pub fn with_kinds(mut self, name: &str, kinds: &[CommandKind]) -> Result<Self> {
        self.config_mut(name)?.supported_kinds = kinds.iter().cloned().collect();
        Ok(self)
    }

    /// Build an interceptor chain
    pub fn build(self) -> InterceptorChain {
        let mut chain = InterceptorChain::new();
        for (_, (interceptor, config)) in self.interceptors.into_iter().filter(|(_, (_, c))| c.enabled) {
            chain.add_with_config(interceptor, config);
        }
        chain
    }

    pub fn registered_interceptors(&self) -> Vec<&str> {
        self.interceptors.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.interceptors.contains_key(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.interceptors
            .get(name)
            .map(|(_, config)| config.enabled)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::interceptor::LoggingInterceptor;
    use super::*;

    struct Audit;

    impl FluteInterceptor for Audit {
        fn name(&self) -> &'static str {
            "audit"
        }
    }

    #[test]
    fn test_only_enabled_interceptors_are_chained() {
        let builder = InterceptorBuilder::new()
            .register_instance(LoggingInterceptor::new())
            .register_instance(Audit)
            .enable("logging")
            .unwrap()
            .with_order("logging", -1)
            .unwrap();
        assert!(builder.is_registered("audit"));
        assert!(!builder.is_enabled("audit"));
        let chain = builder.build();
        assert_eq!(chain.names(), vec!["logging"]);
    }

    #[test]
    fn test_unknown_interceptor_is_an_error() {
        let err = InterceptorBuilder::new().enable("missing").err().unwrap();
        assert!(err.to_string().contains("'missing' not found"));
    }
}
