//! Derived per-video metrics.
//!
//! Every derived column is gated by its own column-presence check, so a
//! missing input only skips the columns that need it. Recomputing over an
//! already-engineered dataset overwrites the derived columns in place.

use super::model::{has_columns, Column, Dataset, Value};

pub const VIEWS: &str = "videoViewCount";
pub const SUBSCRIBERS: &str = "subscriberCount";
pub const LIKES: &str = "videoLikeCount";
pub const DISLIKES: &str = "videoDislikeCount";
pub const COMMENTS: &str = "VideoCommentCount";
pub const CATEGORY_ID: &str = "videoCategoryId";
pub const CATEGORY_NAME: &str = "categoryName";
pub const PUBLISH_MONTH: &str = "publishMonth";

pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Weights of the engagement score: views, likes, comments.
pub const ENGAGEMENT_WEIGHTS: (f64, f64, f64) = (0.4, 0.4, 0.2);

/// YouTube's standard video category ids.
const CATEGORIES: &[(i64, &str)] = &[
    (1, "Film & Animation"),
    (2, "Autos & Vehicles"),
    (10, "Music"),
    (15, "Pets & Animals"),
    (17, "Sports"),
    (18, "Short Movies"),
    (19, "Travel & Events"),
    (20, "Gaming"),
    (21, "Videoblogging"),
    (22, "People & Blogs"),
    (23, "Comedy"),
    (24, "Entertainment"),
    (25, "News & Politics"),
    (26, "Howto & Style"),
    (27, "Education"),
    (28, "Science & Technology"),
    (29, "Nonprofits & Activism"),
    (30, "Movies"),
    (31, "Anime/Animation"),
    (32, "Action/Adventure"),
    (33, "Classics"),
    (34, "Comedy"),
    (35, "Documentary"),
    (36, "Drama"),
    (37, "Family"),
    (38, "Foreign"),
    (39, "Horror"),
    (40, "Sci-Fi/Fantasy"),
    (41, "Thriller"),
    (42, "Shorts"),
    (43, "Shows"),
    (44, "Trailers"),
];

/// Label for a category id, if it is one of the standard ids.
pub fn category_label(id: i64) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(k, _)| *k == id)
        .map(|(_, name)| *name)
}

/// Meteorological season of a month number (1-12).
pub fn season_of(month: i64) -> Option<&'static str> {
    match month {
        12 | 1 | 2 => Some("Winter"),
        3..=5 => Some("Spring"),
        6..=8 => Some("Summer"),
        9..=11 => Some("Fall"),
        _ => None,
    }
}

/// Add category names, engagement rates, season and like/dislike metrics.
///
/// Works on a copy; the input dataset is never modified.
pub fn engineer(dataset: &Dataset) -> Dataset {
    let mut out = dataset.clone();
    let n = dataset.len();

    if let Some(ids) = dataset.column(CATEGORY_ID) {
        let names = ids
            .values
            .iter()
            .map(|v| {
                let label = v
                    .as_whole_i64()
                    .and_then(category_label)
                    .unwrap_or(UNKNOWN_CATEGORY);
                Value::String(label.to_string())
            })
            .collect();
        out.set_column(CATEGORY_NAME, names);
    }

    if let Some([views, subs]) = select(dataset, [VIEWS, SUBSCRIBERS]) {
        let values = (0..n)
            .map(|i| match (views.f64_at(i), subs.f64_at(i)) {
                (Some(v), Some(s)) if s > 0.0 && v > 0.0 => Value::float_or_null(v / s),
                _ => Value::Null,
            })
            .collect();
        out.set_column("views_per_subscriber", values);
    }

    if let Some([likes, views]) = select(dataset, [LIKES, VIEWS]) {
        // A rate above 1 means more likes than views: a collection artifact,
        // pinned to 1.0. Only this rate is clamped.
        let values = per_view_rate(likes, views)
            .into_iter()
            .map(|r| match r {
                Value::Float(x) => Value::Float(x.clamp(0.0, 1.0)),
                other => other,
            })
            .collect();
        out.set_column("like_rate", values);
    }

    if let Some([comments, views]) = select(dataset, [COMMENTS, VIEWS]) {
        out.set_column("comment_rate", per_view_rate(comments, views));
    }

    if let Some([views, likes, comments]) = select(dataset, [VIEWS, LIKES, COMMENTS]) {
        let (wv, wl, wc) = ENGAGEMENT_WEIGHTS;
        let values: Vec<Value> = (0..n)
            .map(
                |i| match (views.f64_at(i), likes.f64_at(i), comments.f64_at(i)) {
                    (Some(v), Some(l), Some(c)) if v > 0.0 => {
                        Value::float_or_null(v.ln_1p() * wv + l.ln_1p() * wl + c.ln_1p() * wc)
                    }
                    _ => Value::Null,
                },
            )
            .collect();
        // the score column only appears once at least one row qualifies
        if values.iter().any(|v| !v.is_null()) {
            out.set_column("engagement_score", values);
        }
    }

    if let Some([dislikes, views]) = select(dataset, [DISLIKES, VIEWS]) {
        out.set_column("dislike_rate", per_view_rate(dislikes, views));
    }

    if let Some(months) = dataset.column(PUBLISH_MONTH) {
        let values = months
            .values
            .iter()
            .map(|m| match m.as_whole_i64().and_then(season_of) {
                Some(s) => Value::String(s.to_string()),
                None => Value::Null,
            })
            .collect();
        out.set_column("season", values);
    }

    if let Some([likes, dislikes]) = select(dataset, [LIKES, DISLIKES]) {
        let net = likes
            .values
            .iter()
            .zip(&dislikes.values)
            .map(|(l, d)| match (l, d) {
                (Value::Integer(a), Value::Integer(b)) => a
                    .checked_sub(*b)
                    .map_or_else(|| Value::float_or_null(*a as f64 - *b as f64), Value::Integer),
                _ => match (l.as_f64(), d.as_f64()) {
                    (Some(a), Some(b)) => Value::float_or_null(a - b),
                    _ => Value::Null,
                },
            })
            .collect();
        out.set_column("net_likes", net);

        let ratio = (0..n)
            .map(|i| match (likes.f64_at(i), dislikes.f64_at(i)) {
                (Some(l), Some(d)) if d > 0.0 => Value::float_or_null(l / d),
                _ => Value::Null,
            })
            .collect();
        out.set_column("like_to_dislike_ratio", ratio);
    }

    out
}

/// The named columns, or `None` unless every one of them is present.
fn select<'a, const N: usize>(dataset: &'a Dataset, names: [&str; N]) -> Option<[&'a Column; N]> {
    if !has_columns(dataset, &names) {
        return None;
    }
    let cols: Vec<&Column> = names
        .iter()
        .map(|n| dataset.column(n))
        .collect::<Option<_>>()?;
    cols.try_into().ok()
}

/// `numerator / views` where views are positive, null elsewhere.
fn per_view_rate(numerator: &Column, views: &Column) -> Vec<Value> {
    (0..views.values.len())
        .map(|i| match (numerator.f64_at(i), views.f64_at(i)) {
            (Some(x), Some(v)) if v > 0.0 => Value::float_or_null(x / v),
            _ => Value::Null,
        })
        .collect()
}
