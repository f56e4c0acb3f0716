use anyhow::Context;
use clap::{Parser, Subcommand};
use mp4patch::{
    ItemValue, Tag, WriteOptions, ilst::keys, inspect, preview, read_tag, write_tag,
};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "Rewrite MP4/M4A metadata in place of the existing tag")]
struct Args {
    /// JSON file with write options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bytes per copy when streaming unchanged data (overrides --config)
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current tag
    Show {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Change tag items, keeping the ones not mentioned
    Set {
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        /// Track number, optionally with total: `3` or `3/12`
        #[arg(long)]
        track: Option<String>,
        /// Merge items from a JSON tag file
        #[arg(long)]
        from_json: Option<PathBuf>,
        /// Print the rewrite strategy without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove every tag item
    Clear { path: PathBuf },
    /// Print box layout, padding and chunk offset tables
    Inspect {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let options = load_options(&args)?;

    match args.command {
        Command::Show { path, json } => {
            let tag = read_tag(&mut open(&path)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tag)?);
            } else {
                print_tag(&tag);
            }
        }
        Command::Set {
            path,
            title,
            artist,
            album,
            year,
            genre,
            comment,
            track,
            from_json,
            dry_run,
        } => {
            let mut tag = read_tag(&mut open(&path)?)?;
            if let Some(json) = from_json {
                let text = std::fs::read_to_string(&json)
                    .with_context(|| format!("reading {}", json.display()))?;
                tag.merge(serde_json::from_str(&text)?);
            }
            for (key, value) in [
                (keys::TITLE, title),
                (keys::ARTIST, artist),
                (keys::ALBUM, album),
                (keys::YEAR, year),
                (keys::GENRE, genre),
                (keys::COMMENT, comment),
            ] {
                if let Some(v) = value {
                    tag.set_text(key, v);
                }
            }
            if let Some(track) = track {
                let (number, total) = parse_track(&track)?;
                tag.set_track(number, total);
            }

            if dry_run {
                let summary = preview(&mut open(&path)?, &tag)?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                write_tag(&path, &tag, &options)
                    .with_context(|| format!("writing tag to {}", path.display()))?;
            }
        }
        Command::Clear { path } => {
            write_tag(&path, &Tag::new(), &options)
                .with_context(|| format!("clearing tag of {}", path.display()))?;
        }
        Command::Inspect { path, json } => {
            let layout = inspect(&mut open(&path)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&layout)?);
            } else {
                print_boxes(&layout.boxes, 0);
                println!();
                println!("payload:        mdat at {} ({} bytes)", layout.payload.0, layout.payload.1);
                if let Some((start, size)) = layout.metadata_region {
                    println!("ilst:           at {start} ({size} bytes)");
                }
                println!("meta padding:   {}", fmt_opt(layout.meta_padding));
                println!("top padding:    {}", fmt_opt(layout.usable_top_padding));
                for t in &layout.offset_tables {
                    println!(
                        "offset table:   {:?} at {}, {} entries, first {}",
                        t.width,
                        t.entries_start,
                        t.offsets.len(),
                        fmt_opt(t.first_offset())
                    );
                }
            }
        }
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "mp4patch=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_options(args: &Args) -> anyhow::Result<WriteOptions> {
    let mut options = match &args.config {
        Some(path) => WriteOptions::load(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => WriteOptions::default(),
    };
    if let Some(n) = args.chunk_size {
        options = options.with_chunk_size(n).validate()?;
    }
    Ok(options)
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(f))
}

fn parse_track(s: &str) -> anyhow::Result<(u16, u16)> {
    let (number, total) = match s.split_once('/') {
        Some((n, t)) => (n, Some(t)),
        None => (s, None),
    };
    let number = number.trim().parse().with_context(|| format!("bad track number {s:?}"))?;
    let total = match total {
        Some(t) => t.trim().parse().with_context(|| format!("bad track total {s:?}"))?,
        None => 0,
    };
    Ok((number, total))
}

fn print_tag(tag: &Tag) {
    if tag.is_empty() {
        println!("(no tag items)");
        return;
    }
    for item in &tag.items {
        let key = match &item.key {
            mp4patch::ItemKey::Atom(cc) => cc.to_string(),
            mp4patch::ItemKey::Freeform { mean, name } => format!("----:{mean}:{name}"),
        };
        let value = match &item.value {
            ItemValue::Text { value } => value.clone(),
            ItemValue::Integer { value } => value.to_string(),
            ItemValue::Pair { number, total } => format!("{number}/{total}"),
            ItemValue::Binary { type_indicator, data } => {
                format!("<{} bytes, type {type_indicator}>", data.len())
            }
        };
        println!("{key:<24} {value}");
    }
}

fn print_boxes(boxes: &[mp4patch::api::Box], depth: usize) {
    for b in boxes {
        println!(
            "{:indent$}{} @{} size={} ({})",
            "",
            b.typ,
            b.offset,
            b.size,
            b.full_name,
            indent = depth * 2
        );
        if let Some(children) = &b.children {
            print_boxes(children, depth + 1);
        }
    }
}

fn fmt_opt(v: Option<u64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "none".into())
}
