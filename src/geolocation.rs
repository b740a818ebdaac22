//! Approximate geolocation of free-text location labels
//!
//! Known city names resolve to a table coordinate with a small jitter.
//! Anything else maps to a stable pseudo-location derived from the label.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum jitter applied to table coordinates, per axis
pub const CITY_JITTER_DEGREES: f64 = 0.02;

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

impl Coordinates {
    pub fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }

    /// Clamp into the legal latitude/longitude domain
    pub fn clamped(self) -> Self {
        Self {
            lat: self.lat.clamp(-90.0, 90.0),
            long: self.long.clamp(-180.0, 180.0),
        }
    }
}

const CITY_COORDINATES: &[(&str, f64, f64)] = &[
    // India
    ("kolkata", 22.5726, 88.3639),
    ("calcutta", 22.5726, 88.3639),
    ("delhi", 28.7041, 77.1025),
    ("new delhi", 28.7041, 77.1025),
    ("mumbai", 19.0760, 72.8777),
    ("bombay", 19.0760, 72.8777),
    ("chennai", 13.0827, 80.2707),
    ("madras", 13.0827, 80.2707),
    ("bangalore", 12.9716, 77.5946),
    ("bengaluru", 12.9716, 77.5946),
    ("hyderabad", 17.3850, 78.4867),
    ("pune", 18.5204, 73.8567),
    ("ahmedabad", 23.0225, 72.5714),
    ("jaipur", 26.9124, 75.7873),
    ("surat", 21.1702, 72.8311),
    ("lucknow", 26.8467, 80.9462),
    ("kanpur", 26.4499, 80.3319),
    ("indore", 22.7196, 75.8577),
    ("bhopal", 23.2599, 77.4126),
    ("patna", 25.5941, 85.1376),
    ("vadodara", 22.3072, 73.1812),
    ("ghaziabad", 28.6692, 77.4538),
    ("ludhiana", 30.9010, 75.8573),
    ("agra", 27.1767, 78.0081),
    ("nashik", 19.9975, 73.7898),
    ("faridabad", 28.4089, 77.3178),
    ("meerut", 28.9845, 77.7064),
    ("rajkot", 22.3039, 70.8022),
    ("varanasi", 25.3176, 82.9739),
    ("banaras", 25.3176, 82.9739),
    ("srinagar", 34.0837, 74.7973),
    ("aurangabad", 19.8762, 75.3433),
    ("dhanbad", 23.7957, 86.4304),
    ("amritsar", 31.6340, 74.8723),
    ("allahabad", 25.4358, 81.8463),
    ("prayagraj", 25.4358, 81.8463),
    ("ranchi", 23.3441, 85.3096),
    ("coimbatore", 11.0168, 76.9558),
    ("jabalpur", 23.1815, 79.9864),
    ("gwalior", 26.2183, 78.1828),
    ("vijayawada", 16.5062, 80.6480),
    ("jodhpur", 26.2389, 73.0243),
    ("madurai", 9.9252, 78.1198),
    ("raipur", 21.2514, 81.6296),
    ("kota", 25.2138, 75.8648),
    ("guwahati", 26.1445, 91.7362),
    ("chandigarh", 30.7333, 76.7794),
    ("mysore", 12.2958, 76.6394),
    ("gurgaon", 28.4595, 77.0266),
    ("gurugram", 28.4595, 77.0266),
    ("noida", 28.5355, 77.3910),
    ("dehradun", 30.6340, 78.0297),
    ("nagpur", 21.1458, 79.0882),
    ("visakhapatnam", 17.6868, 83.2185),
    ("vizag", 17.6868, 83.2185),
    ("kochi", 9.9312, 76.2673),
    ("cochin", 9.9312, 76.2673),
    ("goa", 15.2993, 74.1240),
    ("bhubaneswar", 20.2961, 85.8245),
    ("thiruvananthapuram", 8.5241, 76.9366),
    ("trivandrum", 8.5241, 76.9366),
    // United States
    ("new york", 40.7128, -74.0060),
    ("nyc", 40.7128, -74.0060),
    ("los angeles", 34.0522, -118.2437),
    ("la", 34.0522, -118.2437),
    ("san francisco", 37.7749, -122.4194),
    ("sf", 37.7749, -122.4194),
    ("chicago", 41.8781, -87.6298),
    ("washington dc", 38.9072, -77.0369),
    ("dc", 38.9072, -77.0369),
    ("miami", 25.7617, -80.1918),
    ("las vegas", 36.1699, -115.1398),
    ("vegas", 36.1699, -115.1398),
    ("seattle", 47.6062, -122.3321),
    ("boston", 42.3601, -71.0589),
    ("houston", 29.7604, -95.3698),
    // Europe
    ("london", 51.5074, -0.1278),
    ("paris", 48.8566, 2.3522),
    ("berlin", 52.5200, 13.4050),
    ("madrid", 40.4168, -3.7038),
    ("rome", 41.9028, 12.4964),
    ("amsterdam", 52.3676, 4.9041),
    ("zurich", 47.3769, 8.5417),
    ("moscow", 55.7558, 37.6173),
    ("istanbul", 41.0082, 28.9784),
    // Asia
    ("tokyo", 35.6762, 139.6503),
    ("singapore", 1.3521, 103.8198),
    ("dubai", 25.2048, 55.2708),
    ("beijing", 39.9042, 116.4074),
    ("shanghai", 31.2304, 121.4737),
    ("hong kong", 22.3193, 114.1694),
    ("hk", 22.3193, 114.1694),
    ("bangkok", 13.7563, 100.5018),
    ("seoul", 37.5665, 126.9780),
    ("jakarta", -6.2088, 106.8456),
    // Rest of world
    ("sydney", -33.8688, 151.2093),
    ("melbourne", -37.8136, 144.9631),
    ("toronto", 43.6510, -79.3470),
    ("vancouver", 49.2827, -123.1207),
    ("mexico city", 19.4326, -99.1332),
    ("rio de janeiro", -22.9068, -43.1729),
    ("rio", -22.9068, -43.1729),
    ("sao paulo", -23.5505, -46.6333),
    ("cairo", 30.0444, 31.2357),
    ("johannesburg", -26.2041, 28.0473),
    ("cape town", -33.9249, 18.4241),
];

/// Resolves location labels to coordinates
pub struct GeoApproximator {
    cities: HashMap<String, Coordinates>,
    jitter_degrees: f64,
}

impl GeoApproximator {
    /// Create an approximator with the built-in city table
    pub fn new() -> Self {
        let mut geo = Self {
            cities: HashMap::new(),
            jitter_degrees: CITY_JITTER_DEGREES,
        };
        geo.load_default_cities();
        geo
    }

    fn load_default_cities(&mut self) {
        for &(name, lat, long) in CITY_COORDINATES {
            self.add_city(name, Coordinates::new(lat, long));
        }
    }

    /// Add or replace a city entry
    pub fn add_city(&mut self, name: &str, coordinates: Coordinates) {
        self.cities.insert(normalize(name), coordinates);
    }

    /// Table coordinate for a label, without jitter
    pub fn lookup(&self, label: &str) -> Option<Coordinates> {
        self.cities.get(&normalize(label)).copied()
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    /// Resolve a label using the thread-local generator for jitter
    pub fn resolve(&self, label: &str) -> Coordinates {
        self.resolve_with(label, &mut rand::thread_rng())
    }

    /// Resolve a label, drawing city jitter from `rng`.
    ///
    /// Unknown labels never touch `rng`; they use a generator seeded from
    /// the label so the same spelling always lands on the same spot.
    pub fn resolve_with<R: Rng>(&self, label: &str, rng: &mut R) -> Coordinates {
        let key = normalize(label);

        let raw = match self.cities.get(&key) {
            Some(city) => {
                let j = self.jitter_degrees;
                Coordinates::new(
                    city.lat + rng.gen_range(-j..=j),
                    city.long + rng.gen_range(-j..=j),
                )
            }
            None => pseudo_location(&key),
        };

        raw.clamped()
    }
}

impl Default for GeoApproximator {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Sum of character codes; distinct labels may collide
fn label_seed(normalized: &str) -> u64 {
    normalized.chars().map(|c| c as u64).sum()
}

fn pseudo_location(normalized: &str) -> Coordinates {
    let seed = label_seed(normalized);
    let mut rng = StdRng::seed_from_u64(seed);

    if seed % 2 == 0 {
        // Indian subcontinent
        let lat = rng.gen_range(8.0..=32.0);
        let long = rng.gen_range(70.0..=90.0);
        Coordinates::new(lat, long)
    } else {
        let lat = rng.gen_range(-50.0..=60.0);
        let long = rng.gen_range(-120.0..=140.0);
        Coordinates::new(lat, long)
    }
}
