//! Writes a synthetic YouTube video/channel CSV for trying the pipeline.
//!
//! Usage: `generate_sample [OUTPUT] [ROWS]` (defaults: `sample_data.csv`, 20000)

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CATEGORY_IDS: [i64; 12] = [1, 2, 10, 15, 17, 20, 22, 23, 24, 25, 27, 28];

struct Channel {
    id: String,
    name: String,
    subscribers: i64,
    category: i64,
}

/// Log-uniform count in `[10^lo, 10^hi)`.
fn log_count(rng: &mut StdRng, lo: f64, hi: f64) -> i64 {
    10f64.powf(rng.gen_range(lo..hi)).round() as i64
}

fn main() {
    let mut args = std::env::args().skip(1);
    let output_path = args.next().unwrap_or_else(|| "sample_data.csv".to_string());
    let rows: usize = args
        .next()
        .map(|s| s.parse().expect("ROWS must be a positive integer"))
        .unwrap_or(20_000);

    let mut rng = StdRng::seed_from_u64(42);

    let channels: Vec<Channel> = (0..200)
        .map(|i| Channel {
            id: format!("UC{:022}", rng.gen_range(0..u64::MAX / 2)),
            name: format!("Channel {i:03}"),
            subscribers: log_count(&mut rng, 2.0, 7.5),
            category: CATEGORY_IDS[rng.gen_range(0..CATEGORY_IDS.len())],
        })
        .collect();

    let epoch = NaiveDate::from_ymd_opt(2006, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid epoch");

    let mut writer = csv::Writer::from_path(&output_path).expect("Failed to create output file");
    writer
        .write_record([
            "channelId",
            "channelName",
            "subscriberCount",
            "videoViewCount",
            "videoLikeCount",
            "videoDislikeCount",
            "VideoCommentCount",
            "videoCategoryId",
            "videoPublished",
        ])
        .expect("Failed to write header");

    for _ in 0..rows {
        let ch = &channels[rng.gen_range(0..channels.len())];
        let views = log_count(&mut rng, 1.0, 7.0);
        let likes = (views as f64 * rng.gen_range(0.0..0.08)).round() as i64;
        let dislikes = (likes as f64 * rng.gen_range(0.0..0.2)).round() as i64;
        let comments = (views as f64 * rng.gen_range(0.0..0.01)).round() as i64;
        let published = epoch + Duration::minutes(rng.gen_range(0..60 * 24 * 365 * 15));

        // sprinkle in the anomalies the loader has to cope with
        let roll: f64 = rng.gen();
        let likes = match roll {
            r if r < 0.02 => "-1.0".to_string(),
            r if r < 0.03 => "-2.0".to_string(),
            _ => likes.to_string(),
        };
        let dislikes = if roll > 0.99 { "inf".to_string() } else { dislikes.to_string() };
        let category = if rng.gen_bool(0.01) { String::new() } else { ch.category.to_string() };
        let published = if rng.gen_bool(0.005) {
            "unknown".to_string()
        } else {
            published.format("%Y-%m-%d %H:%M:%S").to_string()
        };

        writer
            .write_record([
                ch.id.clone(),
                ch.name.clone(),
                ch.subscribers.to_string(),
                views.to_string(),
                likes,
                dislikes,
                comments.to_string(),
                category,
                published,
            ])
            .expect("Failed to write row");
    }
    writer.flush().expect("Failed to flush output");

    println!("Wrote {rows} videos from {} channels to {output_path}", channels.len());
}
