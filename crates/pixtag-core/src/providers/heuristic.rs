//! Offline heuristic provider
//!
//! No network. Guesses a content category from the image's aspect ratio,
//! picks that category's tags, palette and caption from a fixed taxonomy,
//! and occasionally swaps the last tag for a related variant word.
//!
//! All randomness comes from one seedable RNG so runs can be reproduced.

use async_trait::async_trait;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use crate::annotation::AnnotationResult;
use crate::providers::AnnotationProvider;

/// Inputs shorter than this are not worth decoding
pub const MIN_HEADER_LEN: usize = 100;

/// Aspect ratios above this are landscapes
pub const LANDSCAPE_MIN_ASPECT: f64 = 1.5;
/// Aspect ratios below this are portraits
pub const PORTRAIT_MAX_ASPECT: f64 = 0.7;
/// Inclusive bounds of the "roughly square" band
pub const SQUARE_ASPECT_RANGE: (f64, f64) = (0.9, 1.1);

/// Draw weights for an unknown category, in [`TAXONOMY`] order
pub const CATEGORY_WEIGHTS: [u32; 8] = [3, 2, 2, 2, 2, 1, 1, 1];
/// Chance of looking for a tag substitution at all
pub const VARIATION_PROBABILITY: f64 = 0.5;
/// Chance of substituting once a matching variant list is found
pub const SUBSTITUTION_PROBABILITY: f64 = 0.3;

const SQUARE_CHOICES: [Category; 2] = [Category::Abstract, Category::Food];
const OTHER_CHOICES: [Category; 3] = [Category::City, Category::Animal, Category::Beach];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Landscape,
    Portrait,
    City,
    Animal,
    Food,
    Beach,
    Forest,
    Abstract,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Landscape => "landscape",
            Category::Portrait => "portrait",
            Category::City => "city",
            Category::Animal => "animal",
            Category::Food => "food",
            Category::Beach => "beach",
            Category::Forest => "forest",
            Category::Abstract => "abstract",
        }
    }

    pub fn profile(&self) -> &'static CategoryProfile {
        TAXONOMY
            .iter()
            .find(|profile| profile.category == *self)
            .unwrap_or(&TAXONOMY[0])
    }
}

/// One taxonomy entry
#[derive(Debug)]
pub struct CategoryProfile {
    pub category: Category,
    pub tags: [&'static str; 10],
    pub colors: [&'static str; 3],
    pub description: &'static str,
}

pub static TAXONOMY: [CategoryProfile; 8] = [
    CategoryProfile {
        category: Category::Landscape,
        tags: [
            "landscape", "nature", "mountains", "sky", "outdoors", "scenery", "peaceful",
            "horizon", "clouds", "view",
        ],
        colors: ["#4A6572", "#344955", "#87CEEB"],
        description: "A beautiful natural landscape with majestic mountains under a clear sky",
    },
    CategoryProfile {
        category: Category::Portrait,
        tags: [
            "portrait", "person", "face", "people", "human", "smile", "expression", "closeup",
            "photography", "individual",
        ],
        colors: ["#5D4037", "#8D6E63", "#FF9800"],
        description: "A compelling portrait capturing expressive human features and emotions",
    },
    CategoryProfile {
        category: Category::City,
        tags: [
            "city", "urban", "building", "architecture", "street", "modern", "cityscape",
            "downtown", "skyscrapers", "metropolitan",
        ],
        colors: ["#607D8B", "#455A64", "#FFC107"],
        description: "An urban cityscape featuring modern architecture and bustling city life",
    },
    CategoryProfile {
        category: Category::Animal,
        tags: [
            "animal", "wildlife", "nature", "fur", "wild", "creature", "mammal", "outdoors",
            "fauna", "species",
        ],
        colors: ["#795548", "#5D4037", "#8BC34A"],
        description: "A wildlife animal in its natural habitat showcasing natural beauty",
    },
    CategoryProfile {
        category: Category::Food,
        tags: [
            "food", "delicious", "meal", "fresh", "cooking", "restaurant", "cuisine",
            "appetizing", "culinary", "dish",
        ],
        colors: ["#FF5722", "#E91E63", "#FFC107"],
        description: "Delicious-looking food beautifully presented and professionally photographed",
    },
    CategoryProfile {
        category: Category::Beach,
        tags: [
            "beach", "ocean", "water", "sand", "coast", "vacation", "tropical", "waves",
            "seaside", "shore",
        ],
        colors: ["#4FC3F7", "#29B6F6", "#FFB74D"],
        description: "A scenic beach landscape with ocean waves and sandy shore",
    },
    CategoryProfile {
        category: Category::Forest,
        tags: [
            "forest", "trees", "greenery", "woodland", "path", "wilderness", "foliage",
            "hiking", "nature", "woods",
        ],
        colors: ["#388E3C", "#4CAF50", "#8BC34A"],
        description: "A dense forest with lush green trees and natural wilderness",
    },
    CategoryProfile {
        category: Category::Abstract,
        tags: [
            "abstract", "art", "creative", "design", "pattern", "texture", "colorful",
            "modern art", "composition", "visual",
        ],
        colors: ["#9C27B0", "#673AB7", "#E91E63"],
        description: "An abstract artistic composition with interesting patterns and colors",
    },
];

/// Variant words per category, checked in this order
pub static TAG_VARIANTS: [(Category, [&str; 5]); 5] = [
    (Category::Landscape, ["sunset", "sunrise", "valley", "river", "lake"]),
    (Category::Portrait, ["candid", "studio", "professional", "emotional", "character"]),
    (Category::City, ["night", "daytime", "aerial", "traffic", "lights"]),
    (Category::Animal, ["wild", "domestic", "majestic", "cute", "powerful"]),
    (Category::Food, ["gourmet", "homemade", "restaurant", "fresh", "tasty"]),
];

pub struct HeuristicProvider {
    rng: Mutex<StdRng>,
}

impl HeuristicProvider {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Fixed seed, for reproducible output
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        info!("Heuristic provider ready (offline, {} categories)", TAXONOMY.len());
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Categorize, select and vary in one go
    pub fn annotate_sync(&self, image: &[u8]) -> AnnotationResult {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let guess = guess_category(image, &mut *rng);
        let category = guess.unwrap_or_else(|| weighted_category(&mut *rng));
        let profile = category.profile();

        let mut tags: Vec<String> = profile.tags.iter().map(|t| t.to_string()).collect();
        vary_tags(&mut tags, &mut *rng);

        debug!(
            "Heuristic annotation: guessed {}, using {}",
            guess.map(|c| c.as_str()).unwrap_or("random"),
            category.as_str()
        );

        AnnotationResult::new(
            tags,
            profile.description,
            profile.colors.iter().map(|c| c.to_string()).collect(),
        )
    }
}

impl Default for HeuristicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnnotationProvider for HeuristicProvider {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn annotate(&self, image: &[u8]) -> AnnotationResult {
        self.annotate_sync(image)
    }
}

// ============================================================================
// Steps
// ============================================================================

/// Read width and height from the image header without decoding pixels
pub fn image_dimensions(image: &[u8]) -> Option<(u32, u32)> {
    if image.len() < MIN_HEADER_LEN {
        return None;
    }
    image::ImageReader::new(Cursor::new(image))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Guess a category from the aspect ratio. `None` means "random".
pub fn guess_category<R: Rng + ?Sized>(image: &[u8], rng: &mut R) -> Option<Category> {
    let (width, height) = image_dimensions(image)?;
    if height == 0 {
        return None;
    }

    let aspect = width as f64 / height as f64;
    let (square_min, square_max) = SQUARE_ASPECT_RANGE;

    let category = if aspect > LANDSCAPE_MIN_ASPECT {
        Category::Landscape
    } else if aspect < PORTRAIT_MAX_ASPECT {
        Category::Portrait
    } else if (square_min..=square_max).contains(&aspect) {
        *SQUARE_CHOICES.choose(rng)?
    } else {
        *OTHER_CHOICES.choose(rng)?
    };

    Some(category)
}

/// Weighted draw over the taxonomy using [`CATEGORY_WEIGHTS`]
pub fn weighted_category<R: Rng + ?Sized>(rng: &mut R) -> Category {
    match WeightedIndex::new(CATEGORY_WEIGHTS) {
        Ok(dist) => TAXONOMY[dist.sample(rng)].category,
        Err(_) => TAXONOMY[0].category,
    }
}

/// Maybe replace the last tag with a variant word.
///
/// The first variant list whose category's first three tags intersect `tags`
/// decides; later lists are never consulted.
pub fn vary_tags<R: Rng + ?Sized>(tags: &mut [String], rng: &mut R) {
    if !rng.gen_bool(VARIATION_PROBABILITY) {
        return;
    }

    for (category, variants) in TAG_VARIANTS.iter() {
        let canonical = &category.profile().tags[..3];
        if !canonical.iter().any(|c| tags.iter().any(|t| t == c)) {
            continue;
        }
        if rng.gen_bool(SUBSTITUTION_PROBABILITY) {
            if let (Some(last), Some(variant)) = (tags.last_mut(), variants.choose(rng)) {
                *last = variant.to_string();
            }
        }
        break;
    }
}
