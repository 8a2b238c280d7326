//! Scalar quantities shared by every resource model and architecture family.
//!
//! `Rate`, `Latency`, `Price`, `Durability` and `FailoverTime` are thin
//! wrappers, not because the underlying `f64` needs hiding, but so the type
//! checker stops a CPU rate from being added to a network rate, or a price
//! tagged per-request from being summed with one billed per-hour.
//!
//! Display output for all five types is gated by a single process-wide
//! "machine readable" flag (`set_machine_readable`), toggled once at CLI
//! startup from `--machine-readable` and left alone afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

static MACHINE_READABLE: AtomicBool = AtomicBool::new(false);

/// Sets the process-wide machine-readable flag for `Rate`/`Latency`/`Price`/
/// `Durability`/`FailoverTime` `Display` output.
pub fn set_machine_readable(v: bool) {
    MACHINE_READABLE.store(v, Ordering::Relaxed);
}

fn machine_readable() -> bool {
    MACHINE_READABLE.load(Ordering::Relaxed)
}

/// Whether `Display` output is currently in machine-readable mode; metrics
/// rendering uses this for the quantities that don't carry their own `Display`
/// impl (raw byte counts, percentages).
pub fn is_machine_readable() -> bool {
    machine_readable()
}

// =============================================================================
// Rate
// =============================================================================

/// A throughput, always normalized to operations (or bytes) per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Rate {
    rate: f64,
}

impl Rate {
    pub const ZERO: Rate = Rate { rate: 0.0 };
    pub const UNLIMITED: Rate = Rate { rate: 99_999_999_999.0 };

    #[inline]
    pub const fn secondly(v: f64) -> Self {
        Rate { rate: v }
    }

    #[inline]
    pub const fn hourly(v: f64) -> Self {
        Rate { rate: v / 3600.0 }
    }

    #[inline]
    pub const fn value(self) -> f64 {
        self.rate
    }

    pub fn duration(self) -> f64 {
        1.0 / self.rate
    }

    /// Smallest integer number of operations that covers this rate.
    pub fn next_int(self) -> u64 {
        self.rate.ceil() as u64
    }

    pub fn round_down(self) -> Self {
        Rate { rate: self.rate.floor() }
    }

    pub fn round_up(self) -> Self {
        Rate { rate: self.rate.ceil() }
    }
}

impl Add for Rate {
    type Output = Rate;
    fn add(self, o: Rate) -> Rate {
        Rate { rate: self.rate + o.rate }
    }
}

impl Sub for Rate {
    type Output = Rate;
    /// Saturates at zero for near-misses (within 1e-6) but otherwise asserts
    /// the subtrahend does not exceed the minuend - residual budgets in the
    /// two-phase solver are never allowed to go negative.
    fn sub(self, o: Rate) -> Rate {
        if o.rate > self.rate {
            let res = o.rate - self.rate;
            if res < 0.000_001 {
                return Rate::ZERO;
            }
        }
        debug_assert!(self.rate >= o.rate, "rate budget went negative: {} - {}", self.rate, o.rate);
        Rate { rate: self.rate - o.rate }
    }
}

impl Mul<f64> for Rate {
    type Output = Rate;
    fn mul(self, m: f64) -> Rate {
        Rate { rate: self.rate * m }
    }
}

impl Mul<Rate> for f64 {
    type Output = Rate;
    fn mul(self, r: Rate) -> Rate {
        Rate { rate: self * r.rate }
    }
}

impl Div<f64> for Rate {
    type Output = Rate;
    fn div(self, m: f64) -> Rate {
        if m == 0.0 {
            Rate::UNLIMITED
        } else {
            Rate { rate: self.rate / m }
        }
    }
}

impl Div<Rate> for Rate {
    type Output = f64;
    fn div(self, o: Rate) -> f64 {
        self.rate / o.rate
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if machine_readable() {
            write!(f, "{}", self.rate)
        } else {
            write!(f, "{:.1}/s", self.rate)
        }
    }
}

// =============================================================================
// Latency
// =============================================================================

/// min/avg/max latency in nanoseconds, combined through weighted averages
/// rather than plain arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latency {
    pub min: i64,
    pub avg: i64,
    pub max: i64,
}

impl Default for Latency {
    fn default() -> Self {
        Latency::infinite()
    }
}

impl Latency {
    #[inline]
    pub const fn from_nanos(ns: i64) -> Self {
        Latency { min: ns, avg: ns, max: ns }
    }

    pub fn from_micros(us: f64) -> Self {
        Latency::from_nanos((us * 1_000.0).round() as i64)
    }

    pub fn from_millis(ms: f64) -> Self {
        Latency::from_nanos((ms * 1_000_000.0).round() as i64)
    }

    #[inline]
    pub const fn new(min: i64, avg: i64, max: i64) -> Self {
        Latency { min, avg, max }
    }

    pub fn infinite() -> Self {
        Latency::from_nanos(1000 * 3600 * 1_000_000_000)
    }

    pub fn fix(self) -> Self {
        let mut r = self;
        if r.avg < r.min {
            r.avg = r.min;
        }
        if r.max < r.avg {
            r.max = r.avg;
        }
        r
    }

    pub fn as_avg(self) -> Self {
        Latency::from_nanos(self.avg)
    }

    /// Weighted combination of several latencies, weights must sum to ~1.0.
    pub fn combine(weights: &[(f64, Latency)]) -> Latency {
        let mut min = 100 * 3600 * 1_000_000_000i64;
        let mut max = 0i64;
        let mut weight_sum = 0.0;
        let mut avg = 0.0f64;
        for &(w, lat) in weights {
            weight_sum += w;
            if w != 0.0 {
                min = min.min(lat.min);
                max = max.max(lat.max);
                avg += w * lat.avg as f64;
            }
        }
        debug_assert!((0.9999..=1.00001).contains(&weight_sum));
        Latency { min, avg: avg.round() as i64, max }
    }

    /// Given a target latency already partially accounted for by `weights`,
    /// derive the latency still available for the remaining weight.
    pub fn deduce(target: Latency, weights: &[(f64, Latency)]) -> Latency {
        let mut left_weight = 1.0;
        let mut avg = target.avg as f64;
        for &(w, lat) in weights {
            if (target.avg as f64) < w * lat.avg as f64 {
                avg = 0.0;
            } else {
                avg -= w * lat.avg as f64;
            }
            left_weight -= w;
        }
        if left_weight == 0.0 {
            return Latency::infinite();
        }
        Latency::from_nanos((avg / left_weight).round() as i64)
    }

    /// Fraction of `lower` needed (vs. `higher`) to land at `target` on a
    /// straight line between the two.
    pub fn get_ratio(target: Latency, lower: Latency, higher: Latency) -> f64 {
        debug_assert!(lower.avg < higher.avg);
        if target.avg >= higher.avg {
            return 0.0;
        }
        if target.avg <= lower.avg {
            return 1.0;
        }
        let result = (higher.avg - target.avg) as f64 / (higher.avg - lower.avg) as f64;
        debug_assert!((0.0..=1.0).contains(&result));
        result
    }
}

impl Add for Latency {
    type Output = Latency;
    fn add(self, o: Latency) -> Latency {
        Latency { min: self.min + o.min, avg: self.avg + o.avg, max: self.max + o.max }.fix()
    }
}

impl Sub for Latency {
    type Output = Latency;
    fn sub(self, o: Latency) -> Latency {
        Latency {
            min: if self.min > o.min { self.min - o.min } else { 0 },
            avg: if self.avg > o.avg { self.avg - o.avg } else { 0 },
            max: if self.max > o.max { self.max - o.max } else { 0 },
        }
        .fix()
    }
}

fn format_nanos(ns: i64) -> String {
    const UNITS: [&str; 4] = ["ns", "us", "ms", "s"];
    let mut temp = ns;
    let mut orders = 0usize;
    while temp >= 1000 {
        temp /= 1000;
        orders += 1;
    }
    if orders > 3 {
        orders = 3;
    }
    let divisor = 1000i64.pow(orders as u32);
    let result = ns as f64 / divisor as f64;
    let result_int = result as i64;
    if result_int as f64 == result {
        format!("{}{}", result_int, UNITS[orders])
    } else {
        format!("{:.1}{}", result, UNITS[orders])
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if machine_readable() {
            write!(f, "{}", self.avg)
        } else {
            write!(f, "{}", format_nanos(self.avg))
        }
    }
}

// =============================================================================
// Price
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bill {
    PerHour,
    PerRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    OnDemand,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Timeunit {
    Second = 0,
    Minute = 1,
    Hour = 2,
    Day = 3,
    Month = 4,
    Year = 5,
}

static TIMEUNIT_FOR_PRINT: AtomicU8 = AtomicU8::new(Timeunit::Hour as u8);

pub fn set_timeunit_for_print(u: Timeunit) {
    TIMEUNIT_FOR_PRINT.store(u as u8, Ordering::Relaxed);
}

fn timeunit_for_print() -> Timeunit {
    match TIMEUNIT_FOR_PRINT.load(Ordering::Relaxed) {
        0 => Timeunit::Second,
        1 => Timeunit::Minute,
        3 => Timeunit::Day,
        4 => Timeunit::Month,
        5 => Timeunit::Year,
        _ => Timeunit::Hour,
    }
}

/// A price, always stored as dollars-per-hour internally unless `bill` is
/// `PerRequest` (S3 GET/PUT pricing), in which case `value` is dollars per
/// 1000 requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub value: f64,
    pub bill: Bill,
    pub category: Category,
}

impl Price {
    pub const ZERO: Price = Price { value: 0.0, bill: Bill::PerHour, category: Category::OnDemand };

    pub const fn secondly(val: f64) -> Self {
        Price { value: val * 3600.0, bill: Bill::PerHour, category: Category::OnDemand }
    }
    pub const fn minutely(val: f64) -> Self {
        Price { value: val * 60.0, bill: Bill::PerHour, category: Category::OnDemand }
    }
    pub const fn hourly(val: f64) -> Self {
        Price { value: val, bill: Bill::PerHour, category: Category::OnDemand }
    }
    pub const fn daily(val: f64) -> Self {
        Price { value: val / 24.0, bill: Bill::PerHour, category: Category::OnDemand }
    }
    pub const fn monthly(val: f64) -> Self {
        Price { value: val / 30.0 / 24.0, bill: Bill::PerHour, category: Category::OnDemand }
    }
    pub const fn per_thousand(val: f64) -> Self {
        Price { value: val / 1000.0, bill: Bill::PerRequest, category: Category::OnDemand }
    }
}

impl Add for Price {
    type Output = Price;
    fn add(self, mut o: Price) -> Price {
        debug_assert!(self.bill == o.bill);
        o.value += self.value;
        o
    }
}

impl std::ops::AddAssign for Price {
    fn add_assign(&mut self, o: Price) {
        debug_assert!(self.bill == o.bill);
        self.value += o.value;
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, o: &Price) -> Option<std::cmp::Ordering> {
        debug_assert!(self.bill == o.bill);
        self.value.partial_cmp(&o.value)
    }
}

impl Mul<f64> for Price {
    type Output = Price;
    fn mul(mut self, m: f64) -> Price {
        self.value *= m;
        self
    }
}

impl Mul<Price> for f64 {
    type Output = Price;
    fn mul(self, mut p: Price) -> Price {
        p.value *= self;
        p
    }
}

impl Mul<Price> for u64 {
    type Output = Price;
    fn mul(self, mut p: Price) -> Price {
        p.value *= self as f64;
        p
    }
}

/// A per-request `Price` converted to a per-hour `Price` at a given request
/// rate (e.g. S3 GET cost times the GET rate).
impl Mul<Rate> for Price {
    type Output = Price;
    fn mul(self, r: Rate) -> Price {
        debug_assert!(self.bill == Bill::PerRequest);
        Price { value: self.value * 3600.0 * r.value(), bill: Bill::PerHour, category: self.category }
    }
}

fn for_timeframe(v: f64) -> (f64, &'static str) {
    match timeunit_for_print() {
        Timeunit::Day => (v * 24.0, "d"),
        Timeunit::Month => (v * 24.0 * 30.0, "m"),
        Timeunit::Year => (v * 24.0 * 365.0, "y"),
        Timeunit::Minute => (v / 60.0, "min"),
        Timeunit::Second => (v / 3600.0, "s"),
        Timeunit::Hour => (v, "h"),
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if machine_readable() {
            return write!(f, "{}", self.value);
        }
        match self.bill {
            Bill::PerHour => {
                let (price, unit) = for_timeframe(self.value);
                write!(f, "{:.1}$/{}", price, unit)
            }
            Bill::PerRequest => write!(f, "{:.1}$/1000 Req", self.value),
        }
    }
}

// =============================================================================
// Durability
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Durability {
    pub numeric_value: f64,
}

impl Durability {
    /// `nextafter(n, 1.0)` keeps the "is this strictly below 1.0" invariant
    /// that the nines-counting `Display` impl relies on.
    pub fn new(n: f64) -> Self {
        let v = n.next_up();
        debug_assert!(v <= 1.0);
        Durability { numeric_value: v }
    }

    /// `n` nines of availability, e.g. `from_nines(11)` for S3's 99.999999999%.
    pub fn from_nines(n: u32) -> Self {
        let mut result = 0.0;
        let mut delta = 0.9;
        for _ in 0..n {
            result += delta;
            delta *= 0.1;
        }
        debug_assert!(result <= 1.0);
        Durability { numeric_value: result }
    }

    pub fn calculate(
        num_nodes: u32,
        node_availability_per_month: f64,
        mttr: u64,
        min_nodes_for_durability: u32,
    ) -> Self {
        let afr = 1.0 - node_availability_per_month;
        let seconds_in_year: u64 = 3600 * 24 * 365;
        let seconds_in_month: u64 = 3600 * 24 * 30;
        let lambda = (num_nodes as f64 * afr * mttr as f64) / seconds_in_month as f64;

        let mut result = 0.0;
        let upper = num_nodes - min_nodes_for_durability;
        for i in 0..=upper {
            let fact: f64 = (1..=i).map(|x| x as f64).product();
            result += (-lambda).exp() * lambda.powi(i as i32) / fact;
        }
        if result > 1.0 {
            result = 1.0;
        }

        let intervals_per_year = seconds_in_year / mttr;
        let d = result.powi(intervals_per_year as i32);
        debug_assert!(d <= 1.0001);
        Durability::new(d)
    }
}

impl fmt::Display for Durability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.numeric_value == 1.0 {
            return write!(f, "20");
        }
        debug_assert!(self.numeric_value < 1.0);
        let s = format!("{:.18}", self.numeric_value);
        let bytes = s.as_bytes();
        let mut nines = 0u32;
        for &b in bytes.iter().skip(2) {
            if b == b'9' {
                nines += 1;
            } else {
                break;
            }
        }
        if machine_readable() {
            write!(f, "{}", nines)
        } else {
            write!(f, "{}x9's", nines)
        }
    }
}

// =============================================================================
// FailoverTime
// =============================================================================

/// Estimated time (in seconds) to detect and recover from a primary failure.
///
/// Ordering is intentionally reversed (`other.value <=> self.value`) to
/// match the original model's comparisons; a smaller `value` compares as
/// greater.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailoverTime {
    pub value: f64,
}

impl FailoverTime {
    pub const fn new(seconds: f64) -> Self {
        FailoverTime { value: seconds }
    }
}

impl PartialOrd for FailoverTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        other.value.partial_cmp(&self.value)
    }
}

impl Add for FailoverTime {
    type Output = FailoverTime;
    fn add(self, o: FailoverTime) -> FailoverTime {
        FailoverTime { value: self.value + o.value }
    }
}

impl fmt::Display for FailoverTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if machine_readable() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{}s", self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_saturates_near_zero() {
        let a = Rate::secondly(1.0);
        let b = Rate::secondly(1.0000001);
        assert_eq!(a - b, Rate::ZERO);
    }

    #[test]
    fn rate_division_by_zero_is_unlimited() {
        assert_eq!(Rate::secondly(5.0) / 0.0, Rate::UNLIMITED);
    }

    #[test]
    fn latency_combine_weighted_average() {
        let l = Latency::combine(&[(0.5, Latency::from_nanos(100)), (0.5, Latency::from_nanos(300))]);
        assert_eq!(l.avg, 200);
    }

    #[test]
    fn latency_fix_clamps_ordering() {
        let l = Latency::new(100, 50, 20).fix();
        assert_eq!(l.min, 100);
        assert_eq!(l.avg, 100);
        assert_eq!(l.max, 100);
    }

    #[test]
    fn durability_display_counts_nines() {
        let d = Durability::from_nines(5);
        assert_eq!(format!("{}", d), "5x9's");
    }

    #[test]
    fn failover_time_ordering_is_reversed() {
        let fast = FailoverTime::new(5.0);
        let slow = FailoverTime::new(50.0);
        assert!(fast > slow);
    }

    #[test]
    fn price_addition_requires_matching_bill() {
        let a = Price::hourly(1.0);
        let b = Price::hourly(2.0);
        assert_eq!((a + b).value, 3.0);
    }
}
