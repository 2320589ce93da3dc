//! 游戏配置列表

use flutter_rust_bridge::frb;
use serde::Serialize;

use crate::marker_detector::profile::{DetectionFamily, PROFILES};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileInfo {
    pub id: String,
    pub label: String,
    /// "hue-band" or "hue-band-wrap"
    pub family: String,
}

/// 所有内置游戏配置，按注册顺序
#[frb(sync)]
pub fn list_profiles() -> Vec<ProfileInfo> {
    PROFILES
        .iter()
        .map(|p| ProfileInfo {
            id: p.id.to_string(),
            label: p.label.to_string(),
            family: match p.family {
                DetectionFamily::HueBand => "hue-band",
                DetectionFamily::HueBandWrap => "hue-band-wrap",
            }
            .to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_profiles() {
        let profiles = list_profiles();
        assert_eq!(profiles.len(), PROFILES.len());
        let vlt = profiles.iter().find(|p| p.id == "vlt-dual").unwrap();
        assert_eq!(vlt.family, "hue-band-wrap");
    }
}
