// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Environment descriptor and error logging.

use crate::error::SsrError;
use std::fmt;
use std::sync::Arc;

/// Development server integration.
pub trait DevServer: Send + Sync {
    /// Rewrites an error report so stack locations point at source files.
    fn fix_stacktrace(&self, report: String) -> String;
}

/// Sink for error reports. Defaults to [`TracingReporter`].
pub trait ErrorReporter: Send + Sync {
    /// Reports one error.
    fn report(&self, report: &str);
}

/// Reports errors through `tracing::error!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, report: &str) {
        tracing::error!("{}", report);
    }
}

/// Production flag, dev server handle and error reporter.
#[derive(Clone)]
pub struct SsrEnv {
    is_production: bool,
    dev_server: Option<Arc<dyn DevServer>>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Default for SsrEnv {
    fn default() -> Self {
        Self {
            is_production: false,
            dev_server: None,
            reporter: Arc::new(TracingReporter),
        }
    }
}

impl fmt::Debug for SsrEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsrEnv")
            .field("is_production", &self.is_production)
            .field("dev_server", &self.dev_server.is_some())
            .finish()
    }
}

impl SsrEnv {
    /// Development environment reporting through `tracing`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the production flag.
    pub fn with_production(mut self, is_production: bool) -> Self {
        self.is_production = is_production;
        self
    }

    /// Sets the development server.
    pub fn with_dev_server(mut self, dev_server: Arc<dyn DevServer>) -> Self {
        self.dev_server = Some(dev_server);
        self
    }

    /// Sets the error reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Whether this is a production environment.
    pub fn is_production(&self) -> bool {
        self.is_production
    }

    /// Logs `err` unless it was logged before.
    pub fn log_error(&self, err: &SsrError) {
        if !err.mark_logged() {
            return;
        }
        let report = self.cleanup_error(err);
        self.reporter.report(&report);
    }

    /// Builds the error report, passed through the dev server's stack fixer.
    pub fn cleanup_error(&self, err: &SsrError) -> String {
        let mut report = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            let line = cause.to_string();
            if !report.contains(&line) {
                report.push_str("\nCaused by: ");
                report.push_str(&line);
            }
            source = cause.source();
        }
        match &self.dev_server {
            Some(dev_server) => dev_server.fix_stacktrace(report),
            None => report,
        }
    }
}
