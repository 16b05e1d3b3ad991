//! Command execution and plain-text output

use crate::Command;
use anyhow::{Context, bail};
use tfresolver::{MusicService, ResolvedUrl};
use tfsource::{Page, PlaylistFilter, PlaylistOrder, Track};

pub async fn run(service: &MusicService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search { keywords, limit } => {
            let tracks = service.search(&keywords.join(" ")).await?;
            println!("{} result(s)", tracks.len());
            print_tracks(tracks.iter().take(limit));
        }

        Command::Resolve { track_id, platform } => {
            let resolved = service.resolve(&track_id, platform.as_str()).await?;
            print_resolved(&resolved);
        }

        Command::Play { keywords, index } => {
            let tracks = service.search(&keywords.join(" ")).await?;
            if tracks.is_empty() {
                bail!("no result for {:?}", keywords.join(" "));
            }
            let track = tracks
                .get(index)
                .with_context(|| format!("only {} result(s)", tracks.len()))?;
            println!("playing {}", describe(track));

            let resolved = service.play(&tracks, index).await?;
            print_resolved(&resolved);
        }

        Command::Playlists {
            platform,
            category,
            new,
            page,
            limit,
        } => {
            let filter = PlaylistFilter {
                category,
                order: if new { PlaylistOrder::New } else { PlaylistOrder::Hot },
            };
            let result = service
                .browse_playlists(platform, &filter, Page::number(page, limit))
                .await?;

            for playlist in &result.playlists {
                println!(
                    "{:>12}  {}  ({} tracks, {} plays)",
                    playlist.id, playlist.name, playlist.track_count, playlist.play_count
                );
            }
            if result.has_more {
                println!("more: --page {}", page.saturating_add(1));
            }
        }

        Command::Playlist {
            playlist_id,
            platform,
        } => {
            let playlist = service.playlist_with_tracks(platform, &playlist_id).await?;
            println!("{} by {}", playlist.name, playlist.creator.name);
            if let Some(description) = &playlist.description {
                println!("{}", description);
            }
            print_tracks(playlist.tracks.iter().flatten());
        }

        Command::Categories { platform } => {
            for category in service.playlist_categories(platform).await? {
                let group = category.group.as_deref().unwrap_or("-");
                let hot = if category.hot { " *" } else { "" };
                println!("{:<12} {}{}", group, category.name, hot);
            }
        }

        Command::Hot { limit } => {
            print_tracks(service.hot_tracks(limit).await.iter());
        }
    }

    Ok(())
}

fn print_tracks<'a>(tracks: impl Iterator<Item = &'a Track>) {
    for (i, track) in tracks.enumerate() {
        println!("{:>3}. {}", i, describe(track));
    }
}

fn describe(track: &Track) -> String {
    let seconds = track.duration_ms / 1000;
    format!(
        "{} - {} [{}:{:02}] ({})",
        track.name,
        track.artist_names(),
        seconds / 60,
        seconds % 60,
        track.key()
    )
}

fn print_resolved(resolved: &ResolvedUrl) {
    println!("{}", resolved.url);
    println!("  via {}", resolved.provider);
}
