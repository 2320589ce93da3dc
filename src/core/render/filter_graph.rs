use std::path::{Path, PathBuf};

use crate::marker_detector::ranges::KeepRange;

/// Video encode settings: all-intra, near-lossless, tuned for game footage.
pub const VIDEO_CODEC_ARGS: [&str; 10] = [
    "-c:v",
    "libx264",
    "-g",
    "1",
    "-crf",
    "12",
    "-tune",
    "animation",
    "-pix_fmt",
    "yuv420p",
];

pub const AUDIO_CODEC_ARGS: [&str; 4] = ["-c:a", "aac", "-b:a", "320k"];

/// Trim each keep range out of input 0 and concatenate them in order.
///
/// Returns `None` for an empty range list.
pub fn build_filter_graph(ranges: &[KeepRange]) -> Option<String> {
    if ranges.is_empty() {
        return None;
    }

    let mut graph = String::new();
    let mut inputs = String::new();
    for (i, r) in ranges.iter().enumerate() {
        graph.push_str(&format!(
            "[0:v]trim=start={s:.3}:end={e:.3},setpts=PTS-STARTPTS[v{i}];",
            s = r.start,
            e = r.end,
        ));
        graph.push_str(&format!(
            "[0:a]atrim=start={s:.3}:end={e:.3},asetpts=PTS-STARTPTS[a{i}];",
            s = r.start,
            e = r.end,
        ));
        inputs.push_str(&format!("[v{i}][a{i}]"));
    }
    graph.push_str(&format!(
        "{}concat=n={}:v=1:a=1[outv][outa]",
        inputs,
        ranges.len()
    ));
    Some(graph)
}

/// `<stem>_clean<ext>` inside `output_dir`.
pub fn output_path(output_dir: &Path, file_name: &str) -> PathBuf {
    let source = Path::new(file_name);
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    output_dir.join(format!("{}_clean{}", stem, ext))
}

/// Full ffmpeg argument list for one render job.
pub fn encode_args(input: &Path, filter_graph: &str, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-i".into(), input.to_string_lossy().into_owned()];
    args.extend(["-filter_complex".to_string(), filter_graph.to_string()]);
    args.extend(["-map", "[outv]", "-map", "[outa]"].map(String::from));
    args.extend(VIDEO_CODEC_ARGS.map(String::from));
    args.extend(AUDIO_CODEC_ARGS.map(String::from));
    args.push(output.to_string_lossy().into_owned());
    args.push("-y".into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_graph_two_ranges() {
        let ranges = [
            KeepRange { start: 0.0, end: 9.9 },
            KeepRange { start: 12.1, end: 20.0 },
        ];
        let graph = build_filter_graph(&ranges).unwrap();
        assert_eq!(
            graph,
            "[0:v]trim=start=0.000:end=9.900,setpts=PTS-STARTPTS[v0];\
             [0:a]atrim=start=0.000:end=9.900,asetpts=PTS-STARTPTS[a0];\
             [0:v]trim=start=12.100:end=20.000,setpts=PTS-STARTPTS[v1];\
             [0:a]atrim=start=12.100:end=20.000,asetpts=PTS-STARTPTS[a1];\
             [v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]"
        );
    }

    #[test]
    fn test_filter_graph_empty() {
        assert!(build_filter_graph(&[]).is_none());
    }

    #[test]
    fn test_output_path() {
        let dir = Path::new("out");
        assert_eq!(output_path(dir, "run01.mp4"), dir.join("run01_clean.mp4"));
        assert_eq!(output_path(dir, "raw"), dir.join("raw_clean"));
    }

    #[test]
    fn test_encode_args_order() {
        let args = encode_args(Path::new("in.mp4"), "G", Path::new("out.mp4"));
        assert_eq!(&args[..4], &["-i", "in.mp4", "-filter_complex", "G"]);
        assert!(args.windows(2).any(|w| w == ["-crf", "12"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "320k"]));
        assert_eq!(&args[args.len() - 2..], &["out.mp4", "-y"]);
    }
}
