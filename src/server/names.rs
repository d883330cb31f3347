//! Human-readable process identities.
//!
//! Names look like `focused_hopper`: an adjective joined to the surname of a
//! notable scientist or engineer. They only need to be memorable and unlikely
//! to collide, so a non-cryptographic RNG is fine.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const ADJECTIVES: &[&str] = &[
    "admiring", "adoring", "affectionate", "agitated", "amazing", "angry", "awesome",
    "beautiful", "blissful", "bold", "boring", "brave", "busy", "charming", "clever",
    "compassionate", "competent", "confident", "cool", "dazzling", "determined", "distracted",
    "dreamy", "eager", "ecstatic", "elastic", "elated", "elegant", "eloquent", "epic",
    "exciting", "fervent", "festive", "flamboyant", "focused", "friendly", "frosty", "funny",
    "gallant", "gifted", "goofy", "gracious", "great", "happy", "hardcore", "heuristic",
    "hopeful", "hungry", "infallible", "inspiring", "intelligent", "interesting", "jolly",
    "jovial", "keen", "kind", "laughing", "loving", "lucid", "magical", "modest", "musing",
    "mystifying", "naughty", "nervous", "nice", "nifty", "nostalgic", "objective", "optimistic",
    "peaceful", "pedantic", "pensive", "practical", "priceless", "quirky", "quizzical",
    "recursing", "relaxed", "reverent", "romantic", "sad", "serene", "sharp", "silly",
    "sleepy", "stoic", "strange", "stupefied", "suspicious", "sweet", "tender", "thirsty",
    "trusting", "unruffled", "upbeat", "vibrant", "vigilant", "vigorous", "wizardly",
    "wonderful", "xenodochial", "youthful", "zealous", "zen",
];

const SURNAMES: &[&str] = &[
    "agnesi", "albattani", "allen", "almeida", "archimedes", "ardinghelli", "babbage",
    "banach", "bardeen", "bartik", "bassi", "bell", "benz", "bhabha", "blackwell", "bohr",
    "booth", "borg", "bose", "brahmagupta", "brattain", "brown", "carson", "chandrasekhar",
    "clarke", "colden", "cori", "cray", "curie", "darwin", "davinci", "dijkstra", "dubinsky",
    "easley", "edison", "einstein", "elion", "engelbart", "euclid", "euler", "fermat",
    "fermi", "feynman", "franklin", "galileo", "gates", "goldberg", "goldstine", "golick",
    "goodall", "hamilton", "hawking", "heisenberg", "hermann", "hodgkin", "hoover", "hopper",
    "hugle", "hypatia", "jang", "jennings", "jepsen", "joliot", "jones", "kalam", "keller",
    "khorana", "kilby", "kirch", "knuth", "kowalevski", "lalande", "lamarr", "lamport",
    "leakey", "leavitt", "lichterman", "liskov", "lovelace", "lumiere", "mahavira", "mayer",
    "mccarthy", "mcclintock", "mclean", "mcnulty", "meitner", "mendel", "mestorf", "minsky",
    "mirzakhani", "morse", "murdock", "napier", "nash", "neumann", "newton", "nightingale",
    "nobel", "noether", "northcutt", "noyce", "panini", "pare", "pasteur", "payne",
    "perlman", "pike", "poincare", "poitras", "ptolemy", "raman", "ramanujan", "ride",
    "ritchie", "roentgen", "rosalind", "saha", "sammet", "shaw", "shirley", "shockley",
    "sinoussi", "snyder", "spence", "stallman", "stonebraker", "swanson", "swartz", "swirles",
    "tesla", "thompson", "torvalds", "turing", "varahamihira", "visvesvaraya", "volhard",
    "wescoff", "wiles", "williams", "wilson", "wing", "wozniak", "wright", "yalow", "yonath",
];

/// Number of fresh draws attempted before falling back to a numeric suffix.
const MAX_FRESH_DRAWS: usize = 16;

/// Generates process identities.
pub struct NameGenerator {
    rng: StdRng,
}

impl NameGenerator {
    /// Create a generator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a generator with a fixed seed, for reproducible sequences
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a single `<adjective>_<surname>` name without any collision check.
    pub fn draw(&mut self) -> String {
        loop {
            let adjective = ADJECTIVES.choose(&mut self.rng).copied().unwrap_or("eager");
            let surname = SURNAMES.choose(&mut self.rng).copied().unwrap_or("hopper");
            // Steve Wozniak is not boring
            if adjective == "boring" && surname == "wozniak" {
                continue;
            }
            return format!("{}_{}", adjective, surname);
        }
    }

    /// Generate a name for which `is_taken` returns false.
    ///
    /// Up to 16 fresh draws are tried first. If every draw collides, the last
    /// draw gets a numeric suffix (`_2`, `_3`, ...) until a free name is found.
    pub fn generate(&mut self, mut is_taken: impl FnMut(&str) -> bool) -> String {
        let mut candidate = self.draw();
        for _ in 1..MAX_FRESH_DRAWS {
            if !is_taken(&candidate) {
                return candidate;
            }
            tracing::debug!(name = %candidate, "Generated name already taken, drawing again");
            candidate = self.draw();
        }
        if !is_taken(&candidate) {
            return candidate;
        }

        let mut suffix = 2u32;
        loop {
            let suffixed = format!("{}_{}", candidate, suffix);
            if !is_taken(&suffixed) {
                return suffixed;
            }
            suffix += 1;
        }
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new()
    }
}
