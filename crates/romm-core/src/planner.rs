//! Platform-preference-driven file planner.
//!
//! Pure scoring functions, no mutable state: one function per decision, the
//! caller owns the result.

use crate::model::{DownloadBundle, DownloadFileSpec, Game, PlannerMode, RomFile};
use std::collections::HashMap;

const GROUP_BONUS_EXTENSIONS: [&str; 3] = ["cue", "gdi", "m3u"];
const AVOID_PENALTY: i64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct SlugPrefs {
    pub mode: PlannerMode,
    pub prefer_ext: Vec<String>,
    pub ignore_ext: Vec<String>,
    pub avoid_name_tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PlatformPrefs {
    pub version: u32,
    pub default_mode: PlannerMode,
    pub default_ignore_ext: Vec<String>,
    pub by_slug: HashMap<String, SlugPrefs>,
}

impl PlatformPrefs {
    fn for_slug(&self, slug: &str) -> (PlannerMode, Vec<String>, Vec<String>) {
        match self.by_slug.get(slug) {
            Some(p) => {
                let mut ignore = self.default_ignore_ext.clone();
                ignore.extend(p.ignore_ext.iter().cloned());
                (p.mode, p.prefer_ext.clone(), ignore)
            }
            None => (self.default_mode, Vec::new(), self.default_ignore_ext.clone()),
        }
    }

    fn avoid_tokens(&self, slug: &str) -> Vec<String> {
        self.by_slug
            .get(slug)
            .map(|p| p.avoid_name_tokens.clone())
            .unwrap_or_default()
    }
}

fn extension_of(name: &str) -> String {
    name.rsplit('.').next().unwrap_or("").to_ascii_lowercase()
}

fn directory_of(relative_path: &Option<String>) -> String {
    relative_path
        .as_deref()
        .and_then(|p| p.rsplit_once('/'))
        .map(|(dir, _)| dir.to_ascii_lowercase())
        .unwrap_or_default()
}

fn score_file(f: &RomFile, prefer_ext: &[String], avoid_tokens: &[String]) -> i64 {
    let ext = extension_of(&f.name);
    let ext_rank = prefer_ext
        .iter()
        .position(|e| e.eq_ignore_ascii_case(&ext))
        .map(|pos| (prefer_ext.len() - pos) as i64 * 100)
        .unwrap_or(0);
    let lower_name = f.name.to_ascii_lowercase();
    let avoided = avoid_tokens
        .iter()
        .any(|tok| lower_name.contains(&tok.to_ascii_lowercase()));
    ext_rank - if avoided { AVOID_PENALTY } else { 0 }
}

/// Filter + synthesize the candidate file list (planner step 1).
fn candidate_files(game: &Game) -> Vec<RomFile> {
    let mut files: Vec<RomFile> = game
        .files
        .iter()
        .filter(|f| f.category.is_empty() || f.category == "game")
        .cloned()
        .collect();
    if files.is_empty() && !game.preferred_filename.is_empty() {
        files.push(RomFile {
            id: game.preferred_file_id.clone().unwrap_or_else(|| game.id.clone()),
            name: game.preferred_filename.clone(),
            relative_path: None,
            url: String::new(),
            size: game.total_bytes,
            category: "game".to_string(),
        });
    }
    files
}

/// Build a [`DownloadBundle`] for `game` under `prefs`. Returns an empty
/// bundle (no files) when no candidate survives filtering; the caller must
/// surface a Data/InvalidData error at enqueue time in that case.
pub fn plan(game: &Game, prefs: &PlatformPrefs) -> DownloadBundle {
    let (mode, prefer_ext, ignore_ext) = prefs.for_slug(&game.platform_slug);
    let avoid_tokens = prefs.avoid_tokens(&game.platform_slug);

    let files: Vec<RomFile> = candidate_files(game)
        .into_iter()
        .filter(|f| !ignore_ext.iter().any(|e| e.eq_ignore_ascii_case(&extension_of(&f.name))))
        .collect();

    let chosen: Vec<DownloadFileSpec> = match mode {
        PlannerMode::SingleBest => single_best(&files, &prefer_ext, &avoid_tokens),
        PlannerMode::BundleBest => bundle_best(&files, &prefer_ext, &avoid_tokens),
        PlannerMode::AllFiles => files.iter().map(DownloadFileSpec::from).collect(),
    };

    DownloadBundle {
        rom_id: game.id.clone(),
        title: game.title.clone(),
        platform_slug: game.platform_slug.clone(),
        mode,
        files: chosen,
    }
}

fn single_best(files: &[RomFile], prefer_ext: &[String], avoid_tokens: &[String]) -> Vec<DownloadFileSpec> {
    files
        .iter()
        .max_by_key(|f| (score_file(f, prefer_ext, avoid_tokens), f.size))
        .map(|f| vec![DownloadFileSpec::from(f)])
        .unwrap_or_default()
}

fn bundle_best(files: &[RomFile], prefer_ext: &[String], avoid_tokens: &[String]) -> Vec<DownloadFileSpec> {
    let mut groups: HashMap<String, Vec<&RomFile>> = HashMap::new();
    for f in files {
        groups.entry(directory_of(&f.relative_path)).or_default().push(f);
    }

    let best_group = groups.into_values().max_by_key(|group| {
        let best_score = group
            .iter()
            .map(|f| {
                let mut s = score_file(f, prefer_ext, avoid_tokens);
                let ext = extension_of(&f.name);
                if GROUP_BONUS_EXTENSIONS.iter().any(|e| *e == ext) {
                    s += 50;
                }
                s
            })
            .max()
            .unwrap_or(i64::MIN);
        let total_size: u64 = group.iter().map(|f| f.size).sum();
        (best_score, total_size)
    });

    best_group
        .map(|group| group.into_iter().map(DownloadFileSpec::from).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_with(files: Vec<RomFile>) -> Game {
        Game {
            id: "g1".into(),
            title: "Test Game".into(),
            platform_id: "p1".into(),
            platform_slug: "switch".into(),
            preferred_filename: "test.nsp".into(),
            preferred_file_id: None,
            cover_url: None,
            total_bytes: 0,
            files,
        }
    }

    fn rom(id: &str, name: &str, size: u64) -> RomFile {
        RomFile {
            id: id.into(),
            name: name.into(),
            relative_path: None,
            url: format!("http://h/{id}"),
            size,
            category: "game".into(),
        }
    }

    fn default_prefs(mode: PlannerMode) -> PlatformPrefs {
        PlatformPrefs {
            version: 1,
            default_mode: mode,
            default_ignore_ext: vec![],
            by_slug: HashMap::new(),
        }
    }

    #[test]
    fn single_best_picks_higher_prefer_ext_rank() {
        let mut prefs = default_prefs(PlannerMode::SingleBest);
        prefs.by_slug.insert(
            "switch".into(),
            SlugPrefs {
                mode: PlannerMode::SingleBest,
                prefer_ext: vec!["nsp".into(), "xci".into()],
                ignore_ext: vec![],
                avoid_name_tokens: vec![],
            },
        );
        let game = game_with(vec![rom("a", "game.xci", 100), rom("b", "game.nsp", 100)]);
        let bundle = plan(&game, &prefs);
        assert_eq!(bundle.files.len(), 1);
        assert_eq!(bundle.files[0].id, "b");
    }

    #[test]
    fn avoid_tokens_are_penalized() {
        let mut prefs = default_prefs(PlannerMode::SingleBest);
        prefs.by_slug.insert(
            "switch".into(),
            SlugPrefs {
                mode: PlannerMode::SingleBest,
                prefer_ext: vec!["nsp".into()],
                ignore_ext: vec![],
                avoid_name_tokens: vec!["demo".into()],
            },
        );
        let game = game_with(vec![rom("a", "game (demo).nsp", 200), rom("b", "game.nsp", 50)]);
        let bundle = plan(&game, &prefs);
        assert_eq!(bundle.files[0].id, "b");
    }

    #[test]
    fn empty_candidates_yields_empty_bundle() {
        let game = Game {
            preferred_filename: String::new(),
            ..game_with(vec![rom("a", "x.dlc", 5).tap_category("dlc")])
        };
        let prefs = default_prefs(PlannerMode::SingleBest);
        let bundle = plan(&game, &prefs);
        assert!(bundle.files.is_empty());
    }

    impl RomFile {
        fn tap_category(mut self, cat: &str) -> Self {
            self.category = cat.to_string();
            self
        }
    }

    #[test]
    fn bundle_best_groups_by_directory_and_prefers_playlist_bonus() {
        let mut prefs = default_prefs(PlannerMode::BundleBest);
        prefs.by_slug.insert(
            "switch".into(),
            SlugPrefs {
                mode: PlannerMode::BundleBest,
                prefer_ext: vec![],
                ignore_ext: vec![],
                avoid_name_tokens: vec![],
            },
        );
        let mut disc1 = rom("a", "disc1.bin", 700);
        disc1.relative_path = Some("DiscSet/disc1.bin".into());
        let mut cue = rom("b", "disc1.cue", 1);
        cue.relative_path = Some("DiscSet/disc1.cue".into());
        let lone = rom("c", "lonely.iso", 800);
        let game = game_with(vec![disc1, cue, lone]);
        let bundle = plan(&game, &prefs);
        let ids: Vec<_> = bundle.files.iter().map(|f| f.id.as_str()).collect();
        assert!(ids.contains(&"a") && ids.contains(&"b"));
    }
}
