// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::ChronoUtc, writer::BoxMakeWriter},
    layer::SubscriberExt,
};

use crate::cfg::{
    config::LogConfig,
    enums::{LogFormat, LogOutput, RotationFreq},
};

/// Installs the global tracing subscriber from the config's `log` section.
///
/// The returned guard flushes the non-blocking writer on drop; keep it
/// alive for the lifetime of the process.
pub fn init_logger(cfg: &LogConfig) -> Result<WorkerGuard> {
    let (writer, guard) = make_writer(cfg)?;

    let env_filter = EnvFilter::try_new(&cfg.level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .context("failed to parse log level from config or env")?;

    let timer = ChronoUtc::rfc_3339();

    match cfg.format {
        LogFormat::Text => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(timer)
                .with_ansi(matches!(cfg.output, LogOutput::Stdout | LogOutput::Stderr))
                .with_target(true);
            tracing::subscriber::set_global_default(
                Registry::default().with(env_filter).with(layer),
            )
            .context("failed to set global default subscriber")?;
        },
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(timer)
                .with_ansi(false)
                .json();
            tracing::subscriber::set_global_default(
                Registry::default().with(env_filter).with(layer),
            )
            .context("failed to set global default subscriber")?;
        },
    }

    Ok(guard)
}

fn make_writer(cfg: &LogConfig) -> Result<(BoxMakeWriter, WorkerGuard)> {
    Ok(match cfg.output {
        LogOutput::Stdout => {
            let (w, g) = tracing_appender::non_blocking(std::io::stdout());
            (BoxMakeWriter::new(w), g)
        },
        LogOutput::Stderr => {
            let (w, g) = tracing_appender::non_blocking(std::io::stderr());
            (BoxMakeWriter::new(w), g)
        },
        LogOutput::File => {
            let fcfg = cfg
                .file
                .clone()
                .context("log.file is required for output=file")?;
            let path = PathBuf::from(&fcfg.path);
            let dir = path.parent().unwrap_or_else(|| Path::new(""));

            let rotation = match fcfg.rotation_frequency.unwrap_or(RotationFreq::Never) {
                RotationFreq::Minutely => Rotation::MINUTELY,
                RotationFreq::Hourly => Rotation::HOURLY,
                RotationFreq::Daily => Rotation::DAILY,
                RotationFreq::Never => Rotation::NEVER,
            };

            let file_appender = RollingFileAppender::new(
                rotation,
                dir,
                path.file_name().unwrap_or_default(),
            );
            let (w, g) = tracing_appender::non_blocking(file_appender);
            (BoxMakeWriter::new(w), g)
        },
    })
}
