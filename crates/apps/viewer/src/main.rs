use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use foundation::view::MapView;
use layers::surface::{RecordingSurface, SurfaceSnapshot};
use serde::Serialize;
use serde_json::json;
use session::{MapSession, SessionConfig, SettleSummary, ViewOverrides, load_initial_view};
use streaming::protocol::Records;
use streaming::static_feed::StaticFeed;
use streaming::transport::{FeedTransport, HttpTransport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use viewstate::{
    CookieViewStateStore, FileCookieJar, MemoryCookieJar, PersistedView, SystemClock,
    ViewStateStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless nuclear-facility map session")]
struct Args {
    /// JSON session config (defaults apply to missing keys)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Settle the initial view and every --view in order, then print the rendered state
    Replay {
        /// Feed endpoint URL, or a local feed dump (.tsv)
        #[arg(long)]
        feed: Option<String>,

        /// Extra settled view: lon,lat,zoom (repeatable)
        #[arg(long = "view", value_parser = parse_view)]
        views: Vec<PersistedView>,

        /// Page query string overriding the initial view, e.g. "lat=45&zoom=7"
        #[arg(long)]
        query: Option<String>,

        /// Cookie jar file keeping the last view across runs
        #[arg(long)]
        state: Option<PathBuf>,

        /// Viewport size in pixels: WxH
        #[arg(long, value_parser = parse_size)]
        size: Option<(u32, u32)>,
    },

    /// Decode a feed dump and print one JSON record per line
    Parse { path: PathBuf },
}

#[derive(Serialize)]
struct ReplayOutput {
    settles: Vec<SettleSummary>,
    surface: SurfaceSnapshot,
    metrics: BTreeMap<&'static str, i64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    config.apply_env()?;

    match args.command {
        Command::Replay {
            feed,
            views,
            query,
            state,
            size,
        } => {
            if let Some((w, h)) = size {
                config.width_px = w;
                config.height_px = h;
            }
            config.validate()?;
            let feed = feed.unwrap_or_else(|| config.feed_url.clone());
            let output = replay(&config, &feed, &views, query.as_deref(), state.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Parse { path } => parse_dump(&path)?,
    }

    Ok(())
}

async fn replay(
    config: &SessionConfig,
    feed: &str,
    views: &[PersistedView],
    query: Option<&str>,
    state: Option<&Path>,
) -> Result<ReplayOutput, Box<dyn std::error::Error>> {
    let transport = open_feed(feed)?;
    let store = open_store(config, state)?;

    let overrides = query.map(ViewOverrides::from_query).unwrap_or_default();
    let initial = load_initial_view(&*store, config.default_view, &overrides);
    info!(
        lon = initial.lon,
        lat = initial.lat,
        zoom = initial.zoom,
        feed,
        "starting session"
    );

    let mut session = MapSession::new(config, transport, RecordingSurface::new(), store);
    let mut settles = Vec::with_capacity(views.len() + 1);
    for view in std::iter::once(&initial).chain(views) {
        let view = MapView::from_storage(
            view.lon,
            view.lat,
            view.zoom,
            config.width_px,
            config.height_px,
        );
        let summary = session.view_settled(view).await;
        if summary.markers.as_ref().is_some_and(|m| m.fetch_failed) {
            warn!(settle = summary.settle, "feed unavailable for this settle");
        }
        settles.push(summary);
    }

    Ok(ReplayOutput {
        settles,
        surface: session.surface().snapshot(),
        metrics: session.metrics().snapshot().into_iter().collect(),
    })
}

fn open_feed(feed: &str) -> Result<Rc<dyn FeedTransport>, Box<dyn std::error::Error>> {
    if feed.starts_with("http://") || feed.starts_with("https://") {
        return Ok(Rc::new(HttpTransport::new(feed)));
    }
    let body = std::fs::read_to_string(feed).map_err(|e| format!("{feed}: {e}"))?;
    let (static_feed, skipped) = StaticFeed::from_tsv(&body);
    info!(records = static_feed.len(), skipped, path = feed, "loaded feed dump");
    Ok(Rc::new(static_feed))
}

fn open_store(
    config: &SessionConfig,
    state: Option<&Path>,
) -> Result<Box<dyn ViewStateStore>, Box<dyn std::error::Error>> {
    Ok(match state {
        Some(path) => Box::new(CookieViewStateStore::with_ttl_days(
            FileCookieJar::open(path)?,
            SystemClock,
            config.state_ttl_days,
        )),
        None => Box::new(CookieViewStateStore::with_ttl_days(
            MemoryCookieJar::new(),
            SystemClock,
            config.state_ttl_days,
        )),
    })
}

fn parse_dump(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let body = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut records = Records::from_body(body);
    for record in records.by_ref() {
        println!("{}", serde_json::to_string(&record)?);
    }
    println!("{}", json!({ "skipped": records.skipped_lines() }));
    Ok(())
}

fn parse_view(s: &str) -> Result<PersistedView, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [lon, lat, zoom] = parts.as_slice() else {
        return Err(format!("expected lon,lat,zoom, got {s:?}"));
    };
    let lon: f64 = lon.parse().map_err(|_| format!("bad lon {lon:?}"))?;
    let lat: f64 = lat.parse().map_err(|_| format!("bad lat {lat:?}"))?;
    let zoom: u8 = zoom.parse().map_err(|_| format!("bad zoom {zoom:?}"))?;
    if zoom >= foundation::math::ZOOM_LEVELS {
        return Err(format!("zoom {zoom} out of range"));
    }
    Ok(PersistedView::new(lon, lat, zoom))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad width {w:?}"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad height {h:?}"))?;
    if w == 0 || h == 0 {
        return Err("size must be non-zero".to_string());
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::{parse_size, parse_view, replay};
    use pretty_assertions::assert_eq;
    use session::SessionConfig;
    use streaming::protocol::{encode_feed, IconOffset, IconSize, Record};
    use viewstate::PersistedView;

    #[test]
    fn view_and_size_arguments() {
        assert_eq!(
            parse_view("2.76, 46.88, 6"),
            Ok(PersistedView::new(2.76, 46.88, 6))
        );
        assert!(parse_view("2.76,46.88").is_err());
        assert!(parse_view("2.76,46.88,30").is_err());
        assert_eq!(parse_size("800x600"), Ok((800, 600)));
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x600").is_err());
    }

    #[test]
    fn replay_against_a_dump_remembers_the_view() {
        let dir = tempfile::tempdir().unwrap();
        let feed_path = dir.path().join("feed.tsv");
        let state_path = dir.path().join("state.json");
        let plant = Record {
            latitude: 46.88,
            longitude: 2.76,
            icon_url: "./power-20x20.png".to_string(),
            icon_size: IconSize { w: 20, h: 20 },
            icon_offset: IconOffset { dx: -10, dy: -10 },
            title: "<h2>Plant</h2>".to_string(),
            description: String::new(),
        };
        std::fs::write(&feed_path, encode_feed(&[plant])).unwrap();
        let config = SessionConfig::default();
        let feed = feed_path.to_str().unwrap();

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let out = rt
            .block_on(replay(
                &config,
                feed,
                &[PersistedView::new(5.0, 45.0, 7)],
                None,
                Some(&state_path),
            ))
            .unwrap();
        assert_eq!(out.settles.len(), 2);
        assert_eq!(out.surface.markers.len(), 1);

        // The next run opens where the last one ended.
        let out = rt
            .block_on(replay(&config, feed, &[], None, Some(&state_path)))
            .unwrap();
        let view = out.settles[0].view.unwrap();
        assert!((view.lon - 5.0).abs() < 1e-9);
        assert!((view.lat - 45.0).abs() < 1e-9);
        assert_eq!(view.zoom, 7);
    }
}
