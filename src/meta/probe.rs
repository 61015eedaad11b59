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

//! Case fallback for catalog lookups.
//!
//! Drivers differ in whether catalog calls match names case sensitively,
//! and the stored case is unknown up front. A lookup is tried with the name
//! as given, then lowercased, then uppercased, and stops at the first
//! non-empty answer.

use crate::errors::{FluteError, Result};

/// Outcome of a lookup over the case candidates.
#[derive(Debug)]
pub enum Probe<T> {
    /// Rows found, with the name that produced them.
    Found(String, Vec<T>),
    /// Every candidate answered with nothing.
    Absent,
    /// Nothing found and at least one candidate failed; carries the last failure.
    Failed(FluteError),
}

impl<T> Probe<T> {
    /// Rows of a successful probe, empty when absent, the failure otherwise.
    pub fn into_rows(self) -> Result<Vec<T>> {
        match self {
            Probe::Found(_, rows) => Ok(rows),
            Probe::Absent => Ok(Vec::new()),
            Probe::Failed(err) => Err(err),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Probe::Found(..))
    }
}

/// `name`, then its lowercase and uppercase forms, without repeats.
pub fn candidate_names(name: &str, retry: bool) -> Vec<String> {
    let mut names = vec![name.to_string()];
    if retry {
        for candidate in [name.to_lowercase(), name.to_uppercase()] {
            if !names.contains(&candidate) {
                names.push(candidate);
            }
        }
    }
    names
}

pub struct CaseProbe {
    retry: bool,
}

impl CaseProbe {
    pub fn new(retry: bool) -> Self {
        Self { retry }
    }

    pub fn probe<T, F>(&self, name: &str, mut lookup: F) -> Probe<T>
    where
        F: FnMut(&str) -> Result<Vec<T>>,
    {
        let mut last_failure = None;
        for candidate in candidate_names(name, self.retry) {
            match lookup(&candidate) {
                Ok(rows) if !rows.is_empty() => return Probe::Found(candidate, rows),
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!("Catalog lookup failed for '{}', trying the next case: {}", candidate, err);
                    last_failure = Some(err);
                }
            }
        }
        match last_failure {
            Some(err) => Probe::Failed(err),
            None => Probe::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_skip_repeats() {
        assert_eq!(candidate_names("Member", true), vec!["Member", "member", "MEMBER"]);
        assert_eq!(candidate_names("member", true), vec!["member", "MEMBER"]);
        assert_eq!(candidate_names("Member", false), vec!["Member"]);
    }

    #[test]
    fn test_stops_at_first_non_empty() {
        let mut tried = Vec::new();
        let probe = CaseProbe::new(true).probe("Member", |name| {
            tried.push(name.to_string());
            Ok(if name == "member" { vec![1, 2] } else { vec![] })
        });
        assert!(matches!(probe, Probe::Found(ref n, ref rows) if n == "member" && rows.len() == 2));
        assert_eq!(tried, vec!["Member", "member"]);
    }

    #[test]
    fn test_failure_is_retried_and_only_surfaces_when_nothing_found() {
        let probe = CaseProbe::new(true).probe("Member", |name| {
            if name == "Member" {
                Err(FluteError::sql("case sensitive driver"))
            } else if name == "MEMBER" {
                Ok(vec!["ID"])
            } else {
                Ok(vec![])
            }
        });
        assert!(probe.is_found());

        let probe: Probe<i32> = CaseProbe::new(true).probe("Member", |name| Err(FluteError::sql(name)));
        assert!(matches!(probe, Probe::Failed(ref e) if e.to_string().contains("MEMBER")));

        let probe: Probe<i32> = CaseProbe::new(true).probe("Member", |_| Ok(vec![]));
        assert!(matches!(probe, Probe::Absent));
    }
}
