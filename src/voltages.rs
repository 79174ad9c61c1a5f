use rand::Rng;

/// Number of cells in the pack, labelled U1..U21.
pub const CELL_COUNT: usize = 21;

/// Nominal cell voltage the defaults are centred on.
pub const BASE_VOLTAGE: f64 = 3.6;

/// Upper bound of the startup jitter, `[0, INITIAL_JITTER)`.
pub const INITIAL_JITTER: f64 = 0.1;

/// Half-width of the randomize jitter, `[-RANDOMIZE_JITTER, RANDOMIZE_JITTER)`.
pub const RANDOMIZE_JITTER: f64 = 0.1;

/// Parse a user-typed reading. Anything that is not a finite number becomes 0.0.
pub fn parse_or_zero(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// The 21 cell readings plus the jittered defaults they were seeded from.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageArray {
    base: [f64; CELL_COUNT],
    values: [f64; CELL_COUNT],
}

impl VoltageArray {
    pub fn initialize<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut base = [BASE_VOLTAGE; CELL_COUNT];
        for v in base.iter_mut() {
            *v += rng.random_range(0.0..INITIAL_JITTER);
        }

        VoltageArray { base, values: base }
    }

    /// Build an array whose base and current values are both `values`.
    #[allow(dead_code)]
    pub fn from_values(values: [f64; CELL_COUNT]) -> Self {
        VoltageArray { base: values, values }
    }

    /// Re-jitter every reading around its startup default.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for (value, base) in self.values.iter_mut().zip(self.base.iter()) {
            *value = base + rng.random_range(-RANDOMIZE_JITTER..RANDOMIZE_JITTER);
        }
    }

    /// Panics if `index >= CELL_COUNT`.
    pub fn set_at(&mut self, index: usize, raw_text: &str) {
        assert!(
            index < CELL_COUNT,
            "cell index {} out of range (0..{})",
            index,
            CELL_COUNT
        );
        self.values[index] = parse_or_zero(raw_text);
    }

    #[allow(dead_code)]
    pub fn get(&self, index: usize) -> f64 {
        self.values[index]
    }

    #[allow(dead_code)]
    pub fn values(&self) -> &[f64; CELL_COUNT] {
        &self.values
    }

    #[allow(dead_code)]
    pub fn base(&self) -> &[f64; CELL_COUNT] {
        &self.base
    }

    /// Owned copy of the readings, taken when a request is submitted.
    pub fn snapshot(&self) -> [f64; CELL_COUNT] {
        self.values
    }

    /// `("U1", 3.612)`, `("U2", ...)` in cell order.
    pub fn cells(&self) -> impl Iterator<Item = (String, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (cell_label(i), *v))
    }
}

pub fn cell_label(index: usize) -> String {
    format!("U{}", index + 1)
}

/// Three decimals, the way readings are shown in the input grid.
pub fn format_reading(value: f64) -> String {
    format!("{:.3}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_or_zero() {
        assert_eq!(parse_or_zero("3.6"), 3.6);
        assert_eq!(parse_or_zero(" 4.125 "), 4.125);
        assert_eq!(parse_or_zero("-0.5"), -0.5);
        assert_eq!(parse_or_zero("1e1"), 10.0);

        assert_eq!(parse_or_zero(""), 0.0);
        assert_eq!(parse_or_zero("abc"), 0.0);
        assert_eq!(parse_or_zero("3.6V"), 0.0);
        assert_eq!(parse_or_zero("NaN"), 0.0);
        assert_eq!(parse_or_zero("inf"), 0.0);
    }

    #[test]
    fn test_initialize_within_band() {
        let mut rng = StdRng::seed_from_u64(7);
        let array = VoltageArray::initialize(&mut rng);

        assert_eq!(array.values().len(), CELL_COUNT);
        for v in array.values() {
            assert!(*v >= BASE_VOLTAGE && *v <= BASE_VOLTAGE + INITIAL_JITTER + 1e-9);
        }
        assert_eq!(array.values(), array.base());
    }

    #[test]
    fn test_randomize_stays_near_base() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut array = VoltageArray::initialize(&mut rng);

        array.randomize(&mut rng);
        let first = array.snapshot();
        array.randomize(&mut rng);
        let second = array.snapshot();

        assert_ne!(first, second);
        for snapshot in [first, second] {
            for (v, base) in snapshot.iter().zip(array.base().iter()) {
                assert!((v - base).abs() <= RANDOMIZE_JITTER + 1e-9);
            }
        }
    }

    #[test]
    fn test_set_at() {
        let mut array = VoltageArray::from_values([3.6; CELL_COUNT]);

        array.set_at(0, "3.71");
        assert_eq!(array.get(0), 3.71);

        array.set_at(20, "not a number");
        assert_eq!(array.get(20), 0.0);

        // Neighbours untouched
        assert_eq!(array.get(1), 3.6);
        assert_eq!(array.get(19), 3.6);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_set_at_out_of_range_panics() {
        let mut array = VoltageArray::from_values([3.6; CELL_COUNT]);
        array.set_at(CELL_COUNT, "3.6");
    }

    #[test]
    fn test_cells_labels() {
        let array = VoltageArray::from_values([3.6; CELL_COUNT]);
        let cells: Vec<_> = array.cells().collect();
        assert_eq!(cells.len(), 21);
        assert_eq!(cells[0].0, "U1");
        assert_eq!(cells[20].0, "U21");
        assert_eq!(format_reading(cells[0].1), "3.600");
    }
}
