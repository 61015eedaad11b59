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

/// Builds [`Params`](crate::Params) for a statement.
///
/// ```ignore
/// let positional = params![1, "Jack", FluteValue::Null];
/// let named = params! {
///     "name" => "Jack",
///     "id" => 1,
/// };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::None
    };
    ($($name:literal => $value:expr),+ $(,)?) => {
        {
            let mut named = $crate::indexmap::IndexMap::new();
            $(
                named.insert(std::string::String::from($name), $crate::FluteValue::from($value));
            )+
            $crate::Params::Named(named)
        }
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Params::Positional(vec![$($crate::FluteValue::from($value)),+])
    };
}
