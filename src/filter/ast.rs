#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Comparison {
        left: Operand,
        operator: Comparator,
        right: Operand,
    },
    Between {
        path: String,
        lower: Operand,
        upper: Operand,
    },
    In {
        path: String,
        values: Vec<Operand>,
    },
    Function {
        name: FunctionName,
        path: String,
        argument: Option<Operand>,
    },
    And(Box<FilterExpression>, Box<FilterExpression>),
    Or(Box<FilterExpression>, Box<FilterExpression>),
    Not(Box<FilterExpression>),
    Parentheses(Box<FilterExpression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(String),
    Value(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Null,
}

impl Operand {
    pub fn is_path(&self) -> bool {
        matches!(self, Operand::Path(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparator {
    /// The comparator that keeps the meaning when both sides swap places.
    pub fn flipped(self) -> Self {
        match self {
            Comparator::Less => Comparator::Greater,
            Comparator::LessOrEqual => Comparator::GreaterOrEqual,
            Comparator::Greater => Comparator::Less,
            Comparator::GreaterOrEqual => Comparator::LessOrEqual,
            same => same,
        }
    }

    pub fn operator(self) -> &'static str {
        match self {
            Comparator::Equal => "$eq",
            Comparator::NotEqual => "$ne",
            Comparator::Less => "$lt",
            Comparator::LessOrEqual => "$lte",
            Comparator::Greater => "$gt",
            Comparator::GreaterOrEqual => "$gte",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    Exists,
    NotExists,
    Type,
    BeginsWith,
    Contains,
}

impl FunctionName {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "exists" => Some(FunctionName::Exists),
            "not_exists" => Some(FunctionName::NotExists),
            "type" => Some(FunctionName::Type),
            "begins_with" => Some(FunctionName::BeginsWith),
            "contains" => Some(FunctionName::Contains),
            _ => None,
        }
    }

    pub fn takes_argument(self) -> bool {
        matches!(
            self,
            FunctionName::Type | FunctionName::BeginsWith | FunctionName::Contains
        )
    }
}
