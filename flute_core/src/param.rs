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

use indexmap::IndexMap;
use crate::FluteValue;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<FluteValue>),
    Named(IndexMap<String, FluteValue>),
}

impl Params {
    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(v) => v.len(),
            Params::Named(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in binding order regardless of the representation.
    pub fn values(&self) -> Vec<&FluteValue> {
        match self {
            Params::None => vec![],
            Params::Positional(v) => v.iter().collect(),
            Params::Named(v) => v.values().collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&FluteValue> {
        match self {
            Params::None => None,
            Params::Positional(v) => v.get(index),
            Params::Named(v) => v.get_index(index).map(|(_, value)| value),
        }
    }
}

impl From<Vec<FluteValue>> for Params {
    fn from(v: Vec<FluteValue>) -> Self {
        if v.is_empty() {
            Params::None
        } else {
            Params::Positional(v)
        }
    }
}

impl From<IndexMap<String, FluteValue>> for Params {
    fn from(v: IndexMap<String, FluteValue>) -> Self {
        Params::Named(v)
    }
}

impl std::fmt::Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params_str = match self {
            Params::None => String::new(),
            Params::Positional(v) => v.iter()
                .enumerate()
                .map(|(i, value)| format!("{}: {}", i + 1, display_param(value)))
                .collect::<Vec<String>>()
                .join(", "),
            Params::Named(v) => v.iter()
                .map(|(key, value)| format!("{}: {}", key, display_param(value)))
                .collect::<Vec<String>>()
                .join(", "),
        };
        write!(f, "==>  Parameters: {}", params_str)
    }
}

fn display_param(value: &FluteValue) -> String {
    match value {
        FluteValue::Json(json) => {
            let json_str = json.to_string();
            if json_str.len() > 50 {
                format!("JSON '{}...'", json_str.chars().take(47).collect::<String>())
            } else {
                format!("JSON '{}'", json_str)
            }
        }
        FluteValue::Uuid(uuid) => format!("UUID '{}'", uuid),
        FluteValue::Array(list) if list.len() > 3 => format!("[{} items]", list.len()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_display() {
        let params = crate::params![1, "Jack", FluteValue::Null];
        assert_eq!(params.to_string(), "==>  Parameters: 1: 1, 2: 'Jack', 3: null");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_named_display_keeps_order() {
        let params = crate::params! {
            "name" => "Jack",
            "id" => 7,
        };
        assert_eq!(params.to_string(), "==>  Parameters: name: 'Jack', id: 7");
        assert_eq!(params.get(1), Some(&FluteValue::Int(7)));
    }

    #[test]
    fn test_empty_params() {
        assert!(Params::None.is_empty());
        assert_eq!(Params::from(Vec::<FluteValue>::new()), Params::None);
        assert_eq!(Params::None.to_string(), "==>  Parameters: ");
    }
}
