//! Scene decomposition.
//!
//! Turns a topic prompt or a custom script into an ordered list of scene
//! plans and splits the requested duration across them.

use vgen_models::{ScenePlan, VideoStyle};

/// What the scenes are generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneSource<'a> {
    /// One topic; every scene gets the same prompt tagged with its position
    Topic(&'a str),
    /// A script split into lines (or sentences) distributed over the scenes
    Script(&'a str),
}

/// Plan `scene_count` scenes covering `duration_seconds`.
///
/// A script with fewer segments than scenes shrinks the plan to one scene
/// per segment. The result is never empty.
pub fn plan_scenes(
    source: SceneSource<'_>,
    style: VideoStyle,
    duration_seconds: u32,
    scene_count: u32,
) -> Vec<ScenePlan> {
    let requested = scene_count.max(1);

    let prompts: Vec<String> = match source {
        SceneSource::Topic(topic) => (1..=requested)
            .map(|i| format!("{}, style: {}, scene {} of {}", topic.trim(), style, i, requested))
            .collect(),
        SceneSource::Script(script) => {
            let segments = script_segments(script);
            if segments.is_empty() {
                vec![format!("{}, style: {}", script.trim(), style)]
            } else {
                let count = requested.min(segments.len() as u32);
                group_segments(&segments, count)
                    .into_iter()
                    .map(|text| format!("{}, style: {}", text, style))
                    .collect()
            }
        }
    };

    let durations = split_duration(duration_seconds, prompts.len() as u32);
    prompts
        .into_iter()
        .zip(durations)
        .enumerate()
        .map(|(index, (prompt, duration_seconds))| ScenePlan {
            index: index as u32,
            prompt,
            duration_seconds,
        })
        .collect()
}

/// Non-empty lines, or the sentences of a single-line script.
fn script_segments(script: &str) -> Vec<String> {
    let lines: Vec<&str> = script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() != 1 {
        return lines.into_iter().map(str::to_string).collect();
    }

    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in lines[0].chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Contiguous groups in order; the first `len % count` groups get one extra.
fn group_segments(segments: &[String], count: u32) -> Vec<String> {
    let count = count.max(1) as usize;
    let base = segments.len() / count;
    let extra = segments.len() % count;

    let mut groups = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = base + usize::from(i < extra);
        groups.push(segments[start..start + size].join(" "));
        start += size;
    }
    groups
}

/// Even split; the first `total % count` scenes get one extra second.
fn split_duration(total: u32, count: u32) -> Vec<u32> {
    let count = count.max(1);
    let base = total / count;
    let extra = total % count;
    (0..count).map(|i| (base + u32::from(i < extra)).max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_plan() {
        let plans = plan_scenes(SceneSource::Topic("a fox in snow"), VideoStyle::Tiktok, 30, 6);
        assert_eq!(plans.len(), 6);
        assert_eq!(plans[0].prompt, "a fox in snow, style: tiktok, scene 1 of 6");
        assert_eq!(plans[3].prompt, "a fox in snow, style: tiktok, scene 4 of 6");
        assert!(plans.iter().all(|p| p.duration_seconds == 5));
        assert_eq!(
            plans.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn test_uneven_duration_split() {
        let plans = plan_scenes(SceneSource::Topic("t"), VideoStyle::Youtube, 17, 4);
        let durations: Vec<u32> = plans.iter().map(|p| p.duration_seconds).collect();
        assert_eq!(durations, vec![5, 4, 4, 4]);
        assert_eq!(durations.iter().sum::<u32>(), 17);
    }

    #[test]
    fn test_short_duration_keeps_one_second_minimum() {
        let plans = plan_scenes(SceneSource::Topic("t"), VideoStyle::Tiktok, 2, 3);
        assert_eq!(
            plans.iter().map(|p| p.duration_seconds).collect::<Vec<_>>(),
            vec![1, 1, 1]
        );
    }

    #[test]
    fn test_script_lines_shrink_scene_count() {
        let script = "Open on the city.\n\nCut to the river.\nEnd at sunset.";
        let plans = plan_scenes(SceneSource::Script(script), VideoStyle::Cinematic, 30, 6);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[1].prompt, "Cut to the river., style: cinematic");
        assert_eq!(
            plans.iter().map(|p| p.duration_seconds).collect::<Vec<_>>(),
            vec![10, 10, 10]
        );
    }

    #[test]
    fn test_single_line_script_splits_sentences() {
        let script = "One. Two! Three? Four";
        let plans = plan_scenes(SceneSource::Script(script), VideoStyle::Tiktok, 8, 2);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].prompt, "One. Two!, style: tiktok");
        assert_eq!(plans[1].prompt, "Three? Four, style: tiktok");
    }
}
