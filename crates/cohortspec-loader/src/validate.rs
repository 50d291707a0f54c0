//! Semantic checks over a mapped document
//!
//! Runs after every member has been mapped, so references can be checked
//! against the complete set of declared names. Names that were declared but
//! failed to map are still known here; they are not reported a second time.

use chrono::NaiveDate;
use cohortspec_diagnostics::{
    CSP0109, CSP0200, CSP0201, CSP0202, CSP0203, CSP0204, CSP0205, CSP0206, CSP0207, CSP0208, CSP0209,
    CSP0210, CSP0211, CSP0212, CSP0213, CSP0214, CSP0215, CSP0217, CSP0218, Diagnostic, Diagnostics,
};
use cohortspec_model::{
    CategoryExpectation, Codelist, DateContext, DateExpr, DateWindow, Distribution, Expectations, Operator,
    RESERVED_NAMES, ReturnType, VariableDefinition,
};
use cohortspec_parser::is_identifier;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Check a variable name before its definition is kept
pub fn check_variable_name(name: &str, seen: &HashSet<String>, diagnostics: &mut Diagnostics) -> bool {
    let path = format!("variables.{}", name);
    if seen.contains(name) {
        diagnostics.push(
            Diagnostic::error(CSP0200, format!("Variable '{}' is defined more than once", name))
                .at_path(path)
                .with_help("Only the first definition is kept"),
        );
        return false;
    }
    if RESERVED_NAMES.contains(&name) {
        diagnostics.push(
            Diagnostic::error(CSP0202, format!("'{}' is a reserved name", name))
                .at_path(path)
                .with_help(format!("Reserved names: {}", RESERVED_NAMES.join(", "))),
        );
        return false;
    }
    if !is_identifier(name) {
        let mut diagnostic =
            Diagnostic::error(CSP0201, format!("'{}' is not a valid variable name", name)).at_path(path);
        diagnostic.help = CSP0201.info().help.map(str::to_string);
        diagnostics.push(diagnostic);
        return false;
    }
    true
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Cross-member checks for one document
pub struct Validator<'a> {
    context: Option<DateContext>,
    defaults: &'a Expectations,
    variables: &'a IndexMap<String, VariableDefinition>,
    declared_variables: &'a HashSet<String>,
    codelists: &'a IndexMap<String, Codelist>,
    declared_codelists: &'a HashSet<String>,
    referenced_codelists: HashSet<&'a str>,
}

impl<'a> Validator<'a> {
    /// `context` is `None` when the index date could not be read; date
    /// resolution checks are skipped then.
    pub fn new(
        context: Option<DateContext>,
        defaults: &'a Expectations,
        variables: &'a IndexMap<String, VariableDefinition>,
        declared_variables: &'a HashSet<String>,
        codelists: &'a IndexMap<String, Codelist>,
        declared_codelists: &'a HashSet<String>,
    ) -> Self {
        Self {
            context,
            defaults,
            variables,
            declared_variables,
            codelists,
            declared_codelists,
            referenced_codelists: HashSet::new(),
        }
    }

    /// Run every check
    pub fn run(mut self, population: Option<&'a VariableDefinition>, diagnostics: &mut Diagnostics) {
        self.check_expectations("default_expectations", self.defaults, diagnostics);

        if let Some(population) = population {
            self.check_population(population, diagnostics);
        }
        let variables = self.variables;
        for (name, variable) in variables {
            self.check_variable(&format!("variables.{}", name), variable, diagnostics);
        }

        self.check_columns(diagnostics);
        self.check_cycles(diagnostics);
        self.check_unused_codelists(diagnostics);
    }

    pub fn check_population(&mut self, population: &'a VariableDefinition, diagnostics: &mut Diagnostics) {
        if !population.is_boolean() {
            diagnostics.push(
                Diagnostic::error(
                    CSP0207,
                    format!("Population returns {} values, not a boolean", population.return_type()),
                )
                .at_path("population")
                .with_help("Use an operator returning binary_flag, or 'satisfying'"),
            );
        }
        self.check_variable("population", population, diagnostics);
    }

    pub fn check_variable(&mut self, path: &str, variable: &'a VariableDefinition, diagnostics: &mut Diagnostics) {
        let operator = &variable.operator;

        if let Some(name) = operator.codelist() {
            self.referenced_codelists.insert(name);
            self.check_codelist_reference(path, operator, name, diagnostics);
        }
        if let Some(window) = operator.window() {
            self.check_window(path, window, diagnostics);
        }
        match operator {
            Operator::AgeAsOf(params) => {
                self.resolve(&format!("{}.reference_date", path), &params.reference_date, diagnostics);
            }
            Operator::Satisfying(params) => {
                for name in params.expression.referenced_variables() {
                    if !self.declared_variables.contains(name) {
                        diagnostics.push(
                            Diagnostic::error(CSP0205, format!("Expression references undefined variable '{}'", name))
                                .at_path(format!("{}.expression", path)),
                        );
                    }
                }
            }
            _ => {}
        }

        if let Some(own) = &variable.return_expectations {
            self.check_expectations(&format!("{}.return_expectations", path), own, diagnostics);
        }
        let effective = match &variable.return_expectations {
            Some(own) => own.merged_over(self.defaults),
            None => self.defaults.clone(),
        };
        self.check_return_type(path, variable, &effective, diagnostics);
    }

    fn check_codelist_reference(&self, path: &str, operator: &Operator, name: &str, diagnostics: &mut Diagnostics) {
        let Some(codelist) = self.codelists.get(name) else {
            if !self.declared_codelists.contains(name) {
                diagnostics.push(
                    Diagnostic::error(CSP0204, format!("Codelist '{}' is not declared", name))
                        .at_path(format!("{}.codelist", path))
                        .with_help("Declare it in the top-level 'codelists' member"),
                );
            }
            return;
        };

        let accepted = operator.accepted_systems();
        if !accepted.contains(&codelist.system) {
            diagnostics.push(
                Diagnostic::error(
                    CSP0215,
                    format!("{} cannot match {} codes from codelist '{}'", operator.name(), codelist.system, name),
                )
                .at_path(format!("{}.codelist", path))
                .with_help(format!(
                    "{} accepts: {}",
                    operator.name(),
                    accepted.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                )),
            );
        }
    }

    fn check_window(&self, path: &str, window: &DateWindow, diagnostics: &mut Diagnostics) {
        let key = match (&window.start, &window.end) {
            (Some(_), Some(_)) => "between",
            (None, Some(_)) => "on_or_before",
            (Some(_), None) => "on_or_after",
            (None, None) => return,
        };
        let path = format!("{}.{}", path, key);

        for expr in window.start.iter().chain(&window.end) {
            self.resolve(&path, expr, diagnostics);
        }
        let Some(context) = &self.context else {
            return;
        };
        if window.is_ordered(context) {
            return;
        }
        if let Some((start, end)) = window.resolve(context) {
            diagnostics.push(
                Diagnostic::error(CSP0203, format!("Window starts on {} but ends on {}", start, end))
                    .at_path(path)
                    .with_help(self.resolution_note()),
            );
        }
    }

    /// Resolve a date expression, reporting dates that leave the calendar
    fn resolve(&self, path: &str, expr: &DateExpr, diagnostics: &mut Diagnostics) -> Option<NaiveDate> {
        let context = self.context.as_ref()?;
        let date = expr.resolve(context);
        if date.is_none() {
            diagnostics.push(
                Diagnostic::error(CSP0109, format!("'{}' resolves outside the supported date range", expr))
                    .at_path(path),
            );
        }
        date
    }

    fn resolution_note(&self) -> String {
        match &self.context {
            Some(context) => format!("Resolved with index_date {} and today {}", context.index_date, context.today),
            None => String::new(),
        }
    }

    pub fn check_expectations(&self, path: &str, expectations: &Expectations, diagnostics: &mut Diagnostics) {
        if let Some(incidence) = expectations.incidence {
            if !(0.0..=1.0).contains(&incidence) {
                diagnostics.push(
                    Diagnostic::error(CSP0209, format!("Incidence {} is outside [0, 1]", incidence))
                        .at_path(format!("{}.incidence", path)),
                );
            }
        }

        if let Some(category) = &expectations.category {
            check_ratios(&format!("{}.category", path), category, diagnostics);
        }

        for (key, distribution) in [("float", &expectations.float), ("int", &expectations.int)] {
            if let Some(distribution) = distribution {
                check_distribution(&format!("{}.{}", path, key), distribution, diagnostics);
            }
        }

        if let Some(date) = &expectations.date {
            let earliest = date
                .earliest
                .as_ref()
                .and_then(|expr| self.resolve(&format!("{}.date.earliest", path), expr, diagnostics));
            let latest = date
                .latest
                .as_ref()
                .and_then(|expr| self.resolve(&format!("{}.date.latest", path), expr, diagnostics));
            if let (Some(earliest), Some(latest)) = (earliest, latest) {
                if earliest > latest {
                    diagnostics.push(
                        Diagnostic::error(
                            CSP0210,
                            format!("Earliest date {} is after latest date {}", earliest, latest),
                        )
                        .at_path(format!("{}.date", path))
                        .with_help(self.resolution_note()),
                    );
                }
            }
        }
    }

    fn check_return_type(
        &self,
        path: &str,
        variable: &VariableDefinition,
        effective: &Expectations,
        diagnostics: &mut Diagnostics,
    ) {
        let return_type = variable.return_type();

        if return_type == ReturnType::Category {
            self.check_categories(path, variable, effective.category.as_ref(), diagnostics);
        }

        let (key, present) = match return_type {
            ReturnType::Float => ("float", effective.float.is_some()),
            ReturnType::Int => ("int", effective.int.is_some()),
            ReturnType::Category => ("category", effective.category.is_some()),
            ReturnType::Date => ("date", effective.date.is_some()),
            ReturnType::Bool | ReturnType::Str => return,
        };
        if !present {
            diagnostics.push(
                Diagnostic::warning(
                    CSP0212,
                    format!("'{}' returns {} values but no '{}' expectation applies", variable.name, return_type, key),
                )
                .at_path(path)
                .with_help("Add it to return_expectations or default_expectations"),
            );
        }
    }

    fn check_categories(
        &self,
        path: &str,
        variable: &VariableDefinition,
        expectation: Option<&CategoryExpectation>,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(codelist) = variable.operator.codelist().and_then(|name| self.codelists.get(name)) else {
            return;
        };
        if !codelist.is_categorised() {
            diagnostics.push(
                Diagnostic::error(
                    CSP0213,
                    format!("Returning 'category' needs a categorised codelist, '{}' has no categories", codelist.name),
                )
                .at_path(format!("{}.returning", path))
                .with_help("Add a 'category_column' to the codelist declaration"),
            );
            return;
        }

        let Some(expectation) = expectation else {
            return;
        };
        let own_ratios = variable
            .return_expectations
            .as_ref()
            .is_some_and(|own| own.category.is_some());
        let ratios_path = if own_ratios {
            format!("{}.return_expectations.category.ratios", path)
        } else {
            "default_expectations.category.ratios".to_string()
        };
        let categories = codelist.categories();
        for label in expectation.ratios.keys() {
            if !categories.contains(label.as_str()) {
                diagnostics.push(
                    Diagnostic::warning(
                        CSP0214,
                        format!("Category '{}' does not occur in codelist '{}'", label, codelist.name),
                    )
                    .at_path(ratios_path.clone())
                    .with_help(format!(
                        "Categories in the codelist: {}",
                        categories.iter().copied().collect::<Vec<_>>().join(", ")
                    )),
                );
            }
        }
    }

    /// Report every `satisfying` reference cycle once
    pub fn check_cycles(&self, diagnostics: &mut Diagnostics) {
        let mut state = HashMap::new();
        let mut stack = Vec::new();
        for name in self.variables.keys() {
            self.visit(name, &mut state, &mut stack, diagnostics);
        }
    }

    fn visit(
        &self,
        name: &'a str,
        state: &mut HashMap<&'a str, Visit>,
        stack: &mut Vec<&'a str>,
        diagnostics: &mut Diagnostics,
    ) {
        match state.get(name) {
            Some(Visit::Done) => return,
            Some(Visit::InProgress) => {
                let start = stack.iter().position(|entry| *entry == name).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(name);
                diagnostics.push(
                    Diagnostic::error(CSP0206, format!("Circular reference: {}", cycle.join(" -> ")))
                        .at_path(format!("variables.{}.expression", name)),
                );
                return;
            }
            None => {}
        }

        let variables = self.variables;
        let Some(variable) = variables.get(name) else {
            return;
        };
        state.insert(name, Visit::InProgress);
        stack.push(name);
        for dependency in variable.operator.dependencies() {
            self.visit(dependency, state, stack, diagnostics);
        }
        stack.pop();
        state.insert(name, Visit::Done);
    }

    /// Each output column must come from one variable only. Generated date
    /// columns can collide with declared variable names.
    pub fn check_columns(&self, diagnostics: &mut Diagnostics) {
        let mut owners: HashMap<String, &str> =
            self.variables.keys().map(|name| (name.clone(), name.as_str())).collect();
        for variable in self.variables.values() {
            let Some(column) = variable.date_column() else {
                continue;
            };
            match owners.get(column.as_str()) {
                Some(owner) => diagnostics.push(
                    Diagnostic::error(
                        CSP0218,
                        format!("Column '{}' of '{}' is also produced by '{}'", column, variable.name, owner),
                    )
                    .at_path(format!("variables.{}", variable.name))
                    .with_help(CSP0218.info().help.unwrap_or_default()),
                ),
                None => {
                    owners.insert(column, &variable.name);
                }
            }
        }
    }

    pub fn check_unused_codelists(&self, diagnostics: &mut Diagnostics) {
        for name in self.codelists.keys() {
            if !self.referenced_codelists.contains(name.as_str()) {
                diagnostics.push(
                    Diagnostic::warning(CSP0217, format!("Codelist '{}' is never used", name))
                        .at_path(format!("codelists.{}", name)),
                );
            }
        }
    }
}

fn check_ratios(path: &str, category: &CategoryExpectation, diagnostics: &mut Diagnostics) {
    if let Some((label, _)) = category.ratios.iter().find(|(_, ratio)| !(ratio.is_finite() && **ratio >= 0.0)) {
        diagnostics.push(
            Diagnostic::error(CSP0208, format!("Ratio for '{}' must be a non-negative number", label))
                .at_path(format!("{}.ratios", path)),
        );
        return;
    }
    if !category.sums_to_one() {
        diagnostics.push(
            Diagnostic::error(CSP0208, format!("Category ratios sum to {}", category.total()))
                .at_path(format!("{}.ratios", path))
                .with_help("Ratios must sum to 1"),
        );
    }
}

fn check_distribution(path: &str, distribution: &Distribution, diagnostics: &mut Diagnostics) {
    let problem = match *distribution {
        Distribution::Normal { mean, stddev } if !(mean.is_finite() && stddev.is_finite()) => {
            Some("mean and stddev must be finite".to_string())
        }
        Distribution::Normal { stddev, .. } if stddev < 0.0 => Some(format!("stddev {} is negative", stddev)),
        Distribution::Uniform { min, max } if !(min.is_finite() && max.is_finite()) => {
            Some("min and max must be finite".to_string())
        }
        Distribution::Uniform { min, max } if min > max => Some(format!("min {} is greater than max {}", min, max)),
        _ => None,
    };
    if let Some(problem) = problem {
        diagnostics.push(
            Diagnostic::error(CSP0211, format!("Invalid {} distribution: {}", distribution_name(distribution), problem))
                .at_path(path),
        );
    }
}

fn distribution_name(distribution: &Distribution) -> &'static str {
    match distribution {
        Distribution::Normal { .. } => "normal",
        Distribution::Uniform { .. } => "uniform",
        Distribution::PopulationAges => "population_ages",
    }
}
