// ABOUTME: Die-roll execution: random sources and the DieRoller that runs full specifications.
// ABOUTME: Handles permutations, repetition, confirmation rolls, DCs, percentile rolls and secret-roll explanations.

use crate::describe::{StructuredDescriptionSet, StructuredResult, Tag};
use crate::dice::{Dice, Natural};
use crate::error::{Error, Result};
use crate::modifiers::{Percentile, Specification};

/// Upper bound on elementary rolls made for one specification, counting
/// each permutation separately. Confirmation rolls ride with their roll.
pub const MAX_ATTEMPTS: u32 = 100;

/// Trait for random number generation, allowing for testing with fixed values.
pub trait Rng {
    /// Generate a random number in the range [1, max].
    fn roll(&mut self, max: u32) -> u32;
}

impl<R: Rng + ?Sized> Rng for &mut R {
    fn roll(&mut self, max: u32) -> u32 {
        (**self).roll(max)
    }
}

/// Default RNG using fastrand.
pub struct FastRng(fastrand::Rng);

impl FastRng {
    pub fn new() -> Self {
        Self(fastrand::Rng::new())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self(fastrand::Rng::with_seed(seed))
    }
}

impl Default for FastRng {
    fn default() -> Self {
        Self::new()
    }
}

impl Rng for FastRng {
    fn roll(&mut self, max: u32) -> u32 {
        self.0.u32(1..=max)
    }
}

/// Rolls full specifications such as `"Attack=d20+5 | c19 | dc 15"`.
///
/// The last specification is remembered, so passing an empty string to
/// [`DieRoller::do_roll`] rolls it again.
pub struct DieRoller<R: Rng = FastRng> {
    rng: R,
    spec: Option<Specification>,
    /// Parsed expression, absent for percentile rolls and permutations.
    dice: Option<Dice>,
    last_natural: Natural,
}

impl DieRoller<FastRng> {
    pub fn new() -> Self {
        Self::with_rng(FastRng::new())
    }
}

impl Default for DieRoller<FastRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> DieRoller<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            spec: None,
            dice: None,
            last_natural: Natural::NotApplicable,
        }
    }

    /// Parse and validate a specification, replacing any previous one.
    ///
    /// Every permutation is checked up front, so a bad combination of
    /// `{a/b/...}` values fails here rather than partway through a roll.
    pub fn set_specification(&mut self, spec: &str) -> Result<()> {
        self.spec = None;
        self.dice = None;

        let parsed = Specification::parse(spec)?;
        self.dice = validate(&parsed)?;
        self.spec = Some(parsed);
        Ok(())
    }

    /// Title of the current specification, empty if there is none.
    pub fn title(&self) -> &str {
        self.spec.as_ref().map_or("", |s| s.title.as_str())
    }

    pub fn specification(&self) -> Option<&Specification> {
        self.spec.as_ref()
    }

    /// Roll a specification, or the previous one when `spec` is blank.
    /// Returns the title and one result per elementary roll.
    pub fn do_roll(&mut self, spec: &str) -> Result<(String, Vec<StructuredResult>)> {
        if !spec.trim().is_empty() {
            self.set_specification(spec)?;
        }
        let spec = self
            .spec
            .take()
            .ok_or_else(|| Error::syntax("no die-roll specification to roll"))?;

        let results = self.execute(&spec);
        let title = spec.title.clone();
        self.spec = Some(spec);
        Ok((title, results?))
    }

    /// Roll a specification that must yield exactly one result.
    pub fn roll_once(&mut self, spec: &str) -> Result<(String, StructuredResult)> {
        if !spec.trim().is_empty() {
            self.set_specification(spec)?;
        }
        if let Some(spec) = &self.spec {
            if spec.always_multiple() {
                let count = (spec.repeat_for.unwrap_or(1) as usize)
                    .saturating_mul(spec.template.as_ref().map_or(1, |t| t.len()))
                    .min(MAX_ATTEMPTS as usize);
                return Err(Error::MultipleResults(count));
            }
        }

        let (title, mut results) = self.do_roll("")?;
        if results.len() != 1 {
            return Err(Error::MultipleResults(results.len()));
        }
        let result = results.remove(0);
        Ok((title, result))
    }

    /// Describe a specification without rolling it, for rolls whose
    /// outcome is hidden from the player.
    pub fn explain_secret_roll(&mut self, spec: &str, notice: &str) -> Result<(String, StructuredResult)> {
        if !spec.trim().is_empty() {
            self.set_specification(spec)?;
        }
        let spec = self
            .spec
            .as_ref()
            .ok_or_else(|| Error::syntax("no die-roll specification to explain"))?;

        let mut details = StructuredDescriptionSet::new();
        match (&spec.percentile, &self.dice) {
            (Some(percentile), _) => details.push(Tag::Diespec, percentile.text()),
            (None, Some(dice)) => details.extend(dice.describe(None)),
            (None, None) => details.push(Tag::Diespec, spec.expression.as_str()),
        }
        spec.describe_modifiers(&mut details);
        if !notice.is_empty() {
            details.push(Tag::Notice, notice);
        }
        Ok((spec.title.clone(), StructuredResult::suppressed(details)))
    }

    /// Whether the most recent primary roll showed its die's maximum face.
    pub fn is_natural_max(&self) -> bool {
        self.last_natural.is_max()
    }

    /// Whether the most recent primary roll showed a natural 1.
    pub fn is_natural1(&self) -> bool {
        self.last_natural.is_one()
    }

    fn execute(&mut self, spec: &Specification) -> Result<Vec<StructuredResult>> {
        let wanted = spec.repeat_for.unwrap_or(1);
        let numbered = spec.repeat_for.is_some() || spec.repeat_until.is_some();
        let mut results = Vec::new();
        let mut counted = 0;
        let mut round = 0;
        let mut attempts = 0;

        while counted < wanted {
            if attempts >= MAX_ATTEMPTS {
                tracing::warn!(attempts, until = ?spec.repeat_until, "gave up repeating roll");
                break;
            }
            round += 1;
            let iteration = numbered.then_some(round);
            if self.iteration(spec, iteration, &mut attempts, &mut results)? {
                counted += 1;
            }
        }

        tracing::debug!(title = %spec.title, results = results.len(), attempts, "rolled specification");
        Ok(results)
    }

    /// Roll every permutation once, stopping early at `MAX_ATTEMPTS`.
    /// Returns whether an `until` target was reached (always `true`
    /// without one).
    fn iteration(
        &mut self,
        spec: &Specification,
        iteration: Option<u32>,
        attempts: &mut u32,
        results: &mut Vec<StructuredResult>,
    ) -> Result<bool> {
        if let Some(percentile) = &spec.percentile {
            *attempts += 1;
            let (met, natural) = percentile_roll(&mut self.rng, spec, percentile, iteration, results);
            self.last_natural = natural;
            return Ok(met);
        }

        if let Some(template) = &spec.template {
            let mut met = false;
            for values in template.permutations() {
                if *attempts >= MAX_ATTEMPTS {
                    break;
                }
                *attempts += 1;
                let dice = Dice::parse(&template.substitute(&values))?;
                let (hit, natural) = elementary(&mut self.rng, spec, &dice, iteration, results)?;
                self.last_natural = natural;
                met |= hit;
            }
            return Ok(met);
        }

        let dice = self
            .dice
            .as_ref()
            .ok_or_else(|| Error::syntax("no expression to roll"))?;
        *attempts += 1;
        let (met, natural) = elementary(&mut self.rng, spec, dice, iteration, results)?;
        self.last_natural = natural;
        Ok(met)
    }
}

/// Parse the expression, or every permutation of it, and check that a
/// confirmation modifier has a single die to work with.
fn validate(spec: &Specification) -> Result<Option<Dice>> {
    if spec.percentile.is_some() {
        return Ok(None);
    }

    let Some(template) = &spec.template else {
        let dice = Dice::parse(&spec.expression)?;
        check_confirmable(spec, &dice, &spec.expression)?;
        return Ok(Some(dice));
    };

    for values in template.permutations() {
        let expr = template.substitute(&values);
        let dice = Dice::parse(&expr)?;
        check_confirmable(spec, &dice, &expr)?;
    }
    Ok(None)
}

fn check_confirmable(spec: &Specification, dice: &Dice, expr: &str) -> Result<()> {
    if spec.confirm.is_some() && dice.natural_die().is_none() {
        return Err(Error::ConfirmationNotApplicable(format!(
            "'{}' does not have exactly one single die to confirm",
            expr
        )));
    }
    Ok(())
}

/// One roll of one expression, plus its confirmation roll when it threatens.
fn elementary<R: Rng>(
    rng: &mut R,
    spec: &Specification,
    dice: &Dice,
    iteration: Option<u32>,
    results: &mut Vec<StructuredResult>,
) -> Result<(bool, Natural)> {
    let eval = if spec.maximized {
        dice.max_roll()?
    } else {
        dice.roll(rng)?
    };

    let mut details = dice.describe_roll(&eval);
    spec.describe_modifiers(&mut details);
    if let Some(i) = iteration {
        details.push(Tag::Iteration, i.to_string());
    }
    spec.describe_outcome(&mut details, eval.total, eval.natural);
    results.push(StructuredResult::new(eval.total, details));

    let met = spec.repeat_until.map_or(true, |target| eval.total >= target);

    if let Some(confirm) = spec.confirm {
        let value = match eval.natural {
            Natural::Face { value, .. } => value,
            Natural::NotApplicable => return Ok((met, eval.natural)),
            Natural::Disqualified => {
                return Err(Error::ConfirmationNotApplicable(
                    "more than one die contributed to the roll".to_string(),
                ))
            }
        };
        let threat = confirm.threat.or(dice.natural_die()).unwrap_or(u32::MAX);
        if value >= threat {
            let check = if spec.maximized {
                dice.max_roll()?
            } else {
                dice.roll(rng)?
            };
            let total = check.total.saturating_add(confirm.bonus);
            tracing::debug!(natural = value, threat, total, "confirming threat");

            let mut details = StructuredDescriptionSet::new();
            details.push(Tag::Critlabel, "Confirm:");
            details.push(Tag::Result, total.to_string());
            details.push(Tag::Separator, "=");
            details.extend(dice.describe(Some(&check)));
            if confirm.bonus != 0 {
                details.push(Tag::Bonus, format!("{:+}", confirm.bonus));
            }
            if let Some(i) = iteration {
                details.push(Tag::Iteration, i.to_string());
            }
            spec.describe_outcome(&mut details, total, check.natural);
            results.push(StructuredResult::new(total, details));
        }
    }

    Ok((met, eval.natural))
}

fn percentile_roll<R: Rng>(
    rng: &mut R,
    spec: &Specification,
    percentile: &Percentile,
    iteration: Option<u32>,
    results: &mut Vec<StructuredResult>,
) -> (bool, Natural) {
    let roll = if spec.maximized { 100 } else { rng.roll(100) };
    let success = roll <= percentile.chance;

    let mut details = StructuredDescriptionSet::new();
    details.push(Tag::Result, roll.to_string());
    details.push(Tag::Separator, "=");
    details.push(Tag::Diespec, percentile.text());
    details.push(if spec.maximized { Tag::Maxroll } else { Tag::Roll }, roll.to_string());
    spec.describe_modifiers(&mut details);
    if let Some(i) = iteration {
        details.push(Tag::Iteration, i.to_string());
    }
    if success {
        details.push(Tag::Success, percentile.success.as_str());
    } else {
        details.push(Tag::Fail, percentile.fail.as_str());
    }
    results.push(StructuredResult::new(roll as i64, details));

    let met = spec.repeat_until.map_or(true, |target| roll as i64 >= target);
    (met, Natural::Face { value: roll, sides: 100 })
}
