// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Log line encoding.
///
/// Text is the human-oriented single-line format; Json emits one JSON
/// document per event for log shippers.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    #[serde(rename = "text", alias = "Text", alias = "TEXT")]
    Text,
    #[serde(rename = "json", alias = "Json", alias = "JSON")]
    Json,
}
impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        })
    }
}

/// Destination of the log stream.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    #[serde(rename = "stdout", alias = "Stdout", alias = "STDOUT")]
    Stdout,
    #[serde(rename = "stderr", alias = "Stderr", alias = "STDERR")]
    Stderr,
    #[serde(rename = "file", alias = "File", alias = "FILE")]
    File,
}
impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogOutput::Stdout => "stdout",
            LogOutput::Stderr => "stderr",
            LogOutput::File => "file",
        })
    }
}

/// Rotation cadence for file output.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationFreq {
    #[serde(rename = "minutely", alias = "Minutely")]
    Minutely,
    #[serde(rename = "hourly", alias = "Hourly")]
    Hourly,
    #[serde(rename = "daily", alias = "Daily")]
    Daily,
    #[serde(rename = "never", alias = "Never")]
    Never,
}
impl fmt::Display for RotationFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RotationFreq::Minutely => "minutely",
            RotationFreq::Hourly => "hourly",
            RotationFreq::Daily => "daily",
            RotationFreq::Never => "never",
        })
    }
}

/// Backend selection for the key/value state store.
///
/// Memory keeps everything process-local; External delegates to whatever
/// adapter the embedding application wires in.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAdapter {
    #[serde(rename = "memory", alias = "Memory", alias = "MEMORY")]
    Memory,
    #[serde(rename = "external", alias = "External", alias = "EXTERNAL")]
    External,
}
impl fmt::Display for StateAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateAdapter::Memory => "memory",
            StateAdapter::External => "external",
        })
    }
}
