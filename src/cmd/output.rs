use std::fmt::Write;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use hlsmon::report::{BadStream, PlaylistProblem};
use hlsmon::{MonitorConfig, MonitorRun, PassStats};

pub fn banner(config: &MonitorConfig) -> String {
    let log = config
        .log_file
        .as_ref()
        .map_or_else(|| "disabled".to_string(), |p| p.display().to_string());
    format!("Concurrency level: {}\nLog: {log}\n", config.concurrency)
}

/// Pass timings followed by one block per unhealthy playlist.
pub fn render_text(run: &MonitorRun) -> String {
    let mut out = String::new();

    for (name, stats) in [
        ("Playlists", &run.passes.playlists),
        ("Streams", &run.passes.streams),
        ("Chunks", &run.passes.chunks),
    ] {
        let _ = writeln!(out, "{}", pass_line(name, stats));
    }

    for playlist in &run.report.unhealthy {
        match &playlist.problem {
            PlaylistProblem::NotAccessible { reason } => {
                let _ = writeln!(out, "Playlist is not available: {}", playlist.url);
                let _ = writeln!(out, "  \\-- Reason: {}", indent(reason, 12));
            }
            PlaylistProblem::BadStreams { streams } => {
                let _ = writeln!(out, "Playlist has bad Streams:");
                let _ = writeln!(out, "  \\-- Playlist URL: {}", playlist.url);
                for stream in streams {
                    write_stream(&mut out, stream);
                }
            }
        }
    }

    let totals = run.report.totals;
    if run.report.is_healthy() {
        let _ = writeln!(
            out,
            "OK: {} playlists, {} streams, {} chunks accessible",
            totals.playlists, totals.streams, totals.chunks
        );
    } else {
        let _ = writeln!(
            out,
            "FAILED: {} of {} playlists unhealthy",
            run.report.unhealthy.len(),
            totals.playlists
        );
    }

    out
}

fn write_stream(out: &mut String, stream: &BadStream) {
    let _ = writeln!(out, "      \\-- Stream url: {}", stream.url);
    if let Some(reason) = &stream.reason {
        let _ = writeln!(out, "          \\-- Reason: {}", indent(reason, 20));
    }
    for chunk in &stream.bad_chunks {
        let _ = writeln!(out, "          \\-- Chunk: {}", chunk.url);
        let _ = writeln!(out, "              \\-- Reason: {}", indent(&chunk.reason, 24));
    }
}

fn pass_line(name: &str, stats: &PassStats) -> String {
    format!(
        "{name} fetching is over in {:.2}s ({} checked, {} failed)",
        stats.elapsed.as_secs_f64(),
        stats.total,
        stats.failed
    )
}

/// Keep multi-line reasons (content previews) under their marker.
fn indent(text: &str, width: usize) -> String {
    text.replace('\n', &format!("\n{}", " ".repeat(width)))
}

pub fn render_json(run: &MonitorRun) -> Result<String> {
    let ms = |d: Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
    let passes = &run.passes;
    let value = json!({
        "healthy": run.report.is_healthy(),
        "passes": {
            "playlists": { "total": passes.playlists.total, "failed": passes.playlists.failed, "elapsed_ms": ms(passes.playlists.elapsed) },
            "streams": { "total": passes.streams.total, "failed": passes.streams.failed, "elapsed_ms": ms(passes.streams.elapsed) },
            "chunks": { "total": passes.chunks.total, "failed": passes.chunks.failed, "elapsed_ms": ms(passes.chunks.elapsed) },
        },
        "report": run.report,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsmon::report::{BadChunk, HealthReport, Totals, UnhealthyPlaylist};
    use hlsmon::{Passes, PlaylistTree};

    fn stats(total: usize, failed: usize) -> PassStats {
        PassStats {
            total,
            succeeded: total - failed,
            failed,
            elapsed: Duration::from_millis(1500),
        }
    }

    fn run_with(report: HealthReport) -> MonitorRun {
        MonitorRun {
            tree: PlaylistTree::new(),
            report,
            passes: Passes {
                playlists: stats(2, 1),
                streams: stats(2, 0),
                chunks: stats(4, 1),
            },
        }
    }

    fn failing_report() -> HealthReport {
        HealthReport {
            totals: Totals {
                playlists: 2,
                streams: 2,
                chunks: 4,
            },
            unhealthy: vec![
                UnhealthyPlaylist {
                    url: "https://a.test/down.m3u8".into(),
                    problem: PlaylistProblem::NotAccessible {
                        reason: "connection failed: refused".into(),
                    },
                },
                UnhealthyPlaylist {
                    url: "https://b.test/master.m3u8".into(),
                    problem: PlaylistProblem::BadStreams {
                        streams: vec![BadStream {
                            url: "https://b.test/low.m3u8".into(),
                            reason: None,
                            bad_chunks: vec![BadChunk {
                                url: "https://b.test/c2.ts".into(),
                                reason: "HTTP status 404 Not Found".into(),
                            }],
                        }],
                    },
                },
            ],
        }
    }

    #[test]
    fn text_report_follows_tree_layout() {
        let text = render_text(&run_with(failing_report()));
        let expected = "\
Playlists fetching is over in 1.50s (2 checked, 1 failed)
Streams fetching is over in 1.50s (2 checked, 0 failed)
Chunks fetching is over in 1.50s (4 checked, 1 failed)
Playlist is not available: https://a.test/down.m3u8
  \\-- Reason: connection failed: refused
Playlist has bad Streams:
  \\-- Playlist URL: https://b.test/master.m3u8
      \\-- Stream url: https://b.test/low.m3u8
          \\-- Chunk: https://b.test/c2.ts
              \\-- Reason: HTTP status 404 Not Found
FAILED: 2 of 2 playlists unhealthy
";
        assert_eq!(text, expected);
    }

    #[test]
    fn healthy_summary() {
        let report = HealthReport {
            totals: Totals {
                playlists: 1,
                streams: 2,
                chunks: 6,
            },
            unhealthy: Vec::new(),
        };
        let text = render_text(&run_with(report));
        assert!(text.ends_with("OK: 1 playlists, 2 streams, 6 chunks accessible\n"));
    }

    #[test]
    fn multi_line_reasons_are_indented() {
        assert_eq!(indent("bad content:\n#EXTM", 4), "bad content:\n    #EXTM");
    }

    #[test]
    fn json_has_passes_and_report() {
        let json = render_json(&run_with(failing_report())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["healthy"], false);
        assert_eq!(value["passes"]["chunks"]["failed"], 1);
        assert_eq!(value["passes"]["streams"]["elapsed_ms"], 1500);
        assert_eq!(value["report"]["unhealthy"][1]["kind"], "bad_streams");
    }
}
