//! # Cloud Catalog
//!
//! Display names and descriptions for the CCSN cloud codes, plus the
//! user-facing confidence messages and photography tips.

use crate::predict::ConfidenceLevel;
use serde::Serialize;

/// The 11 CCSN class codes, in training label order.
pub const CLOUD_CLASSES: [&str; 11] = [
    "Ac", "As", "Cb", "Cc", "Ci", "Cs", "Ct", "Cu", "Ns", "Sc", "St",
];

/// The default class list, as owned names.
pub fn default_class_names() -> Vec<String> {
    CLOUD_CLASSES.iter().map(|c| c.to_string()).collect()
}

/// Catalog entry for a cloud code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloudInfo {
    /// Class code.
    pub code: &'static str,

    /// Korean display name.
    pub name: &'static str,

    /// Short description.
    pub description: &'static str,
}

static CLOUD_INFO: [CloudInfo; 11] = [
    CloudInfo {
        code: "Cu",
        name: "적운",
        description: "하층의 뭉게뭉게한 구름. 맑은 날 낮에 발달하기 쉽다.",
    },
    CloudInfo {
        code: "Cb",
        name: "적란운",
        description: "강한 상승기류로 수직 발달. 소나기·뇌우·번개를 동반할 수 있다.",
    },
    CloudInfo {
        code: "Sc",
        name: "층적운",
        description: "하층의 덩어리 구름이 넓게 퍼진 형태. 구름 사이로 하늘이 조각조각 보이기도 한다.",
    },
    CloudInfo {
        code: "St",
        name: "층운",
        description: "낮게 깔리는 안개 같은 층 구름. 흐리고 균일한 회색 하늘 느낌.",
    },
    CloudInfo {
        code: "As",
        name: "고층운",
        description: "중층의 넓은 막 형태. 해가 물비늘처럼 흐릿하게 비칠 수 있다.",
    },
    CloudInfo {
        code: "Ac",
        name: "고적운",
        description: "중층의 작은 덩어리들이 무리 지어 배열. 물결·비늘처럼 보이기도 한다.",
    },
    CloudInfo {
        code: "Cs",
        name: "권층운",
        description: "상층의 얇은 베일 같은 구름. 해/달 무리(halo)가 나타날 수 있다.",
    },
    CloudInfo {
        code: "Ci",
        name: "권운",
        description: "상층의 실처럼 가늘고 섬유질. 맑은 하늘에 흩어져 보인다.",
    },
    CloudInfo {
        code: "Cc",
        name: "권적운",
        description: "상층의 매우 작은 알갱이(비늘) 무늬. 비늘하늘처럼 보일 수 있다.",
    },
    CloudInfo {
        code: "Ns",
        name: "난층운",
        description: "비를 오래 내리는 두꺼운 층 구름. 하늘이 어둡고 균일하다.",
    },
    CloudInfo {
        code: "Ct",
        name: "권운계(데이터셋 Ct)",
        description: "CCSN 라벨 체계의 Ct 클래스(상층 계열). 데이터셋 정의에 따른 범주.",
    },
];

/// Description used for codes outside the catalog.
pub const UNKNOWN_DESCRIPTION: &str = "설명 준비 중";

/// Display name and description for `code`.
///
/// Unknown codes map to an entry named after the code itself.
pub fn lookup(code: &str) -> (String, String) {
    match CLOUD_INFO.iter().find(|info| info.code == code) {
        Some(info) => (info.name.to_string(), info.description.to_string()),
        None => (code.to_string(), UNKNOWN_DESCRIPTION.to_string()),
    }
}

/// Every catalog entry.
pub fn entries() -> &'static [CloudInfo] {
    &CLOUD_INFO
}

/// User-facing message for a confidence level.
pub fn confidence_text(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::High => "확신 높음",
        ConfidenceLevel::Medium => "확신 보통(비슷한 후보가 있음)",
        ConfidenceLevel::Low => "확신 낮음(혼합운/조건 영향 가능)",
    }
}

/// Photography tips attached to low-confidence results.
pub const TIPS: [&str; 4] = [
    "하늘 비율을 크게(건물/지평선 최소화) 촬영해 주세요.",
    "역광(태양 정면)보다는 태양이 옆/뒤에 오도록 촬영해 주세요.",
    "확대(줌)보다 하늘 전체 패턴이 보이게 찍는 게 좋아요.",
    "구름이 여러 층으로 섞여 있으면 혼합운으로 예측이 흔들릴 수 있어요.",
];

/// Tips for a confidence level; empty unless the level is low.
pub fn tips_for(level: ConfidenceLevel) -> Vec<String> {
    match level {
        ConfidenceLevel::Low => TIPS.iter().map(|t| t.to_string()).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_is_cataloged() {
        for code in CLOUD_CLASSES {
            assert!(entries().iter().any(|info| info.code == code), "{code}");
        }
        assert_eq!(entries().len(), CLOUD_CLASSES.len());

        let mut sorted = CLOUD_CLASSES;
        sorted.sort();
        assert_eq!(sorted, CLOUD_CLASSES);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("Cu").0, "적운");
        assert_eq!(lookup("Ct").0, "권운계(데이터셋 Ct)");
        assert_eq!(
            lookup("Xx"),
            ("Xx".to_string(), UNKNOWN_DESCRIPTION.to_string())
        );
    }

    #[test]
    fn test_tips_only_when_low() {
        assert_eq!(tips_for(ConfidenceLevel::Low).len(), TIPS.len());
        assert!(tips_for(ConfidenceLevel::Medium).is_empty());
        assert!(tips_for(ConfidenceLevel::High).is_empty());
    }
}
