// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{any::Any, error::Error as StdError, sync::Arc};

use http::StatusCode as HttpStatusCode;
use serde::Serialize;
use strum::EnumProperty;

/// Coarse classification of a failure, independent of the crate it came from.
///
/// Every crate-level error maps onto one of these so that the outer surfaces
/// (REST, CLI) can pick a response without matching on message text.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Serialize,
    strum_macros::EnumProperty,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusCode {
    #[strum(props(http_status = "400"))]
    InvalidArgument,
    /// The buffer is full; the producer should back off and retry.
    #[strum(props(http_status = "429"))]
    ResourceExhausted,
    #[strum(props(http_status = "502"))]
    Upstream,
    #[strum(props(http_status = "503"))]
    Unavailable,
    #[strum(props(http_status = "500"))]
    DataLoss,
    #[strum(props(http_status = "500"))]
    Internal,
    #[strum(props(http_status = "500"))]
    Unknown,
}

impl StatusCode {
    pub fn http_status(self) -> HttpStatusCode {
        self.get_str("http_status")
            .and_then(|value| value.parse::<u16>().ok())
            .and_then(|value| HttpStatusCode::from_u16(value).ok())
            .unwrap_or(HttpStatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Returns `true` when retrying the same request later may succeed.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::ResourceExhausted | Self::Upstream | Self::Unavailable)
    }
}

pub trait StackError: StdError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>);

    fn next(&self) -> Option<&dyn StackError>;

    fn last(&self) -> &dyn StackError
    where
        Self: Sized,
    {
        let Some(mut result) = self.next() else {
            return self;
        };
        while let Some(err) = result.next() {
            result = err;
        }
        result
    }

    fn transparent(&self) -> bool { false }
}

pub trait ErrorExt: StackError {
    fn status_code(&self) -> StatusCode { StatusCode::Unknown }

    fn as_any(&self) -> &dyn Any;

    /// Message suitable for an API response body.
    ///
    /// Unknown errors are masked; everything else shows the innermost stack
    /// layer followed by its root cause, if any.
    fn output_msg(&self) -> String
    where
        Self: Sized,
    {
        if self.status_code() == StatusCode::Unknown {
            return "Internal error".to_string();
        }

        let error = self.last();
        if let Some(external_error) = error.source() {
            let mut root = external_error;
            while let Some(source) = root.source() {
                root = source;
            }
            if error.transparent() {
                format!("{root}")
            } else {
                format!("{error}: {root}")
            }
        } else {
            format!("{error}")
        }
    }

    fn root_cause(&self) -> Option<&dyn StdError>
    where
        Self: Sized,
    {
        let error = self.last();
        let mut source = error.source()?;
        while let Some(next) = source.source() {
            source = next;
        }
        Some(source)
    }
}

impl<T: ?Sized + StackError> StackError for Arc<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

impl<T: StackError> StackError for Box<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}
