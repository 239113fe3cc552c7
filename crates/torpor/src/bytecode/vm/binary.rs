//! Binary and unary arithmetic.
//!
//! Mixed-type rules follow reference Python: int op float widens to float,
//! `/` always produces a float, `//` floors toward negative infinity, `%`
//! takes the divisor's sign, and i64 overflow promotes to a bignum.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use crate::{
    bytecode::op::{BinaryOpKind, Opcode},
    exception_private::{ExcType, RunError, RunResult},
    heap::HeapData,
    program::Program,
    resource::ResourceTracker,
    types::{long_int::{bigint_to_value, value_to_bigint}, set::set_insert, PyPath, Set},
    value::Value,
};

use super::VM;

impl<T: ResourceTracker> VM<T> {
    /// Evaluates a unary operator.
    pub(super) fn unary_op(&mut self, op: Opcode, value: Value, program: &Program) -> RunResult<Value> {
        match op {
            Opcode::UnaryNeg => match &value {
                Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
                Value::Int(i) => match i.checked_neg() {
                    Some(result) => Ok(Value::Int(result)),
                    None => bigint_to_value(-BigInt::from(*i), &mut self.heap),
                },
                Value::Float(f) => Ok(Value::Float(-f)),
                Value::Ref(id) => match self.heap.get(*id) {
                    HeapData::LongInt(big) => {
                        let negated = -big.clone();
                        bigint_to_value(negated, &mut self.heap)
                    }
                    _ => Err(bad_unary("-", &value, self, program)),
                },
                _ => Err(bad_unary("-", &value, self, program)),
            },
            Opcode::UnaryPos => match &value {
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Int(_) | Value::Float(_) => Ok(value),
                Value::Ref(id) if matches!(self.heap.get(*id), HeapData::LongInt(_)) => Ok(value),
                _ => Err(bad_unary("+", &value, self, program)),
            },
            Opcode::UnaryInvert => match &value {
                Value::Bool(b) => Ok(Value::Int(-i64::from(*b) - 1)),
                Value::Int(i) => Ok(Value::Int(!i)),
                Value::Ref(id) => match self.heap.get(*id) {
                    HeapData::LongInt(big) => {
                        let inverted = -(big.clone() + 1i64);
                        bigint_to_value(inverted, &mut self.heap)
                    }
                    _ => Err(bad_unary("~", &value, self, program)),
                },
                _ => Err(bad_unary("~", &value, self, program)),
            },
            _ => Err(RunError::internal("not a unary opcode")),
        }
    }

    /// Evaluates a binary operator.
    pub(super) fn binary_op(
        &mut self,
        kind: BinaryOpKind,
        left: Value,
        right: Value,
        program: &Program,
    ) -> RunResult<Value> {
        // bool op bool keeps bool for the bitwise operators, as in Python.
        if let (Value::Bool(a), Value::Bool(b)) = (&left, &right) {
            match kind {
                BinaryOpKind::BitAnd => return Ok(Value::Bool(*a & *b)),
                BinaryOpKind::BitOr => return Ok(Value::Bool(*a | *b)),
                BinaryOpKind::BitXor => return Ok(Value::Bool(*a ^ *b)),
                _ => {}
            }
        }
        // Integer fast path, promoting to bignum on overflow.
        if let (Some(a), Some(b)) = (left.as_index(), right.as_index()) {
            if let Some(result) = self.int_op(kind, a, b)? {
                return Ok(result);
            }
        }
        // Either side a bignum: compute in BigInt.
        if is_bigint(&left, self) || is_bigint(&right, self) {
            if let (Some(a), Some(b)) = (value_to_bigint(&left, &self.heap), value_to_bigint(&right, &self.heap)) {
                return self.bigint_op(kind, a, b);
            }
        }
        // Float arithmetic (covers int/float mixing).
        if matches!(left, Value::Float(_)) || matches!(right, Value::Float(_)) {
            if let (Some(a), Some(b)) = (left.as_number(&self.heap), right.as_number(&self.heap)) {
                return float_op(kind, a, b);
            }
        }
        self.sequence_op(kind, left, right, program)
    }

    /// Integer arithmetic; `Ok(None)` means the operator is not numeric.
    fn int_op(&mut self, kind: BinaryOpKind, a: i64, b: i64) -> RunResult<Option<Value>> {
        let result = match kind {
            BinaryOpKind::Add => match a.checked_add(b) {
                Some(v) => Value::Int(v),
                None => bigint_to_value(BigInt::from(a) + b, &mut self.heap)?,
            },
            BinaryOpKind::Sub => match a.checked_sub(b) {
                Some(v) => Value::Int(v),
                None => bigint_to_value(BigInt::from(a) - b, &mut self.heap)?,
            },
            BinaryOpKind::Mul => match a.checked_mul(b) {
                Some(v) => Value::Int(v),
                None => bigint_to_value(BigInt::from(a) * b, &mut self.heap)?,
            },
            BinaryOpKind::TrueDiv => {
                if b == 0 {
                    return Err(ExcType::division_by_zero());
                }
                Value::Float(a as f64 / b as f64)
            }
            BinaryOpKind::FloorDiv => {
                if b == 0 {
                    return Err(ExcType::int_division_by_zero());
                }
                match (a, b) {
                    (i64::MIN, -1) => bigint_to_value(BigInt::from(a).div_floor(&BigInt::from(b)), &mut self.heap)?,
                    _ => Value::Int(a.div_floor(&b)),
                }
            }
            BinaryOpKind::Mod => {
                if b == 0 {
                    return Err(ExcType::int_division_by_zero());
                }
                Value::Int(a.mod_floor(&b))
            }
            BinaryOpKind::Pow => {
                if b < 0 {
                    if a == 0 {
                        return Err(ExcType::division_by_zero());
                    }
                    return Ok(Some(Value::Float((a as f64).powi(
                        i32::try_from(b).map_err(|_| ExcType::overflow_error("exponent too large"))?,
                    ))));
                }
                match u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)) {
                    Some(v) => Value::Int(v),
                    None => {
                        let exp = u32::try_from(b).map_err(|_| ExcType::overflow_error("exponent too large"))?;
                        bigint_to_value(BigInt::from(a).pow(exp), &mut self.heap)?
                    }
                }
            }
            BinaryOpKind::LShift => {
                if b < 0 {
                    return Err(ExcType::value_error("negative shift count"));
                }
                let shift = u32::try_from(b).map_err(|_| ExcType::overflow_error("shift count too large"))?;
                match a.checked_shl(shift).filter(|v| (v >> shift) == a) {
                    Some(v) => Value::Int(v),
                    None => bigint_to_value(BigInt::from(a) << shift, &mut self.heap)?,
                }
            }
            BinaryOpKind::RShift => {
                if b < 0 {
                    return Err(ExcType::value_error("negative shift count"));
                }
                let shift = u32::try_from(b).unwrap_or(63).min(63);
                Value::Int(a >> shift)
            }
            BinaryOpKind::BitAnd => Value::Int(a & b),
            BinaryOpKind::BitOr => Value::Int(a | b),
            BinaryOpKind::BitXor => Value::Int(a ^ b),
        };
        Ok(Some(result))
    }

    /// Arbitrary-precision arithmetic.
    fn bigint_op(&mut self, kind: BinaryOpKind, a: BigInt, b: BigInt) -> RunResult<Value> {
        let result = match kind {
            BinaryOpKind::Add => a + b,
            BinaryOpKind::Sub => a - b,
            BinaryOpKind::Mul => a * b,
            BinaryOpKind::TrueDiv => {
                if b.is_zero() {
                    return Err(ExcType::division_by_zero());
                }
                let (x, y) = (a.to_f64(), b.to_f64());
                let (Some(x), Some(y)) = (x, y) else {
                    return Err(ExcType::overflow_error("integer division result too large for a float"));
                };
                return Ok(Value::Float(x / y));
            }
            BinaryOpKind::FloorDiv => {
                if b.is_zero() {
                    return Err(ExcType::int_division_by_zero());
                }
                a.div_floor(&b)
            }
            BinaryOpKind::Mod => {
                if b.is_zero() {
                    return Err(ExcType::int_division_by_zero());
                }
                a.mod_floor(&b)
            }
            BinaryOpKind::Pow => {
                let exp = b
                    .to_u32()
                    .ok_or_else(|| ExcType::overflow_error("exponent too large"))?;
                a.pow(exp)
            }
            BinaryOpKind::LShift => {
                let shift = b
                    .to_i64()
                    .filter(|&s| s >= 0)
                    .ok_or_else(|| ExcType::value_error("negative shift count"))?;
                let shift = u32::try_from(shift).map_err(|_| ExcType::overflow_error("shift count too large"))?;
                a << shift
            }
            BinaryOpKind::RShift => {
                let shift = b
                    .to_i64()
                    .filter(|&s| s >= 0)
                    .ok_or_else(|| ExcType::value_error("negative shift count"))?;
                let shift = u32::try_from(shift.min(i64::from(u32::MAX))).expect("clamped");
                a >> shift
            }
            BinaryOpKind::BitAnd => a & b,
            BinaryOpKind::BitOr => a | b,
            BinaryOpKind::BitXor => a ^ b,
        };
        bigint_to_value(result, &mut self.heap)
    }

    /// Non-numeric operator forms: concatenation, repetition, formatting,
    /// path joining, set algebra.
    fn sequence_op(
        &mut self,
        kind: BinaryOpKind,
        left: Value,
        right: Value,
        program: &Program,
    ) -> RunResult<Value> {
        let interns = &program.interns;
        match kind {
            BinaryOpKind::Add => {
                if let (Some(a), Some(b)) = (left.as_str(&self.heap, interns), right.as_str(&self.heap, interns)) {
                    let joined = format!("{a}{b}");
                    return Ok(self.heap.allocate_value(HeapData::Str(joined))?);
                }
                if let (Some(a), Some(b)) = (left.as_bytes(&self.heap, interns), right.as_bytes(&self.heap, interns)) {
                    let mut joined = a.to_vec();
                    joined.extend_from_slice(b);
                    return Ok(self.heap.allocate_value(HeapData::Bytes(joined))?);
                }
                if let (Value::Ref(a), Value::Ref(b)) = (&left, &right) {
                    match (self.heap.get(*a), self.heap.get(*b)) {
                        (HeapData::List(x), HeapData::List(y)) => {
                            let joined = [x.as_slice(), y.as_slice()].concat();
                            return Ok(self.heap.allocate_value(HeapData::List(joined))?);
                        }
                        (HeapData::Tuple(x), HeapData::Tuple(y)) => {
                            let joined = [x.as_slice(), y.as_slice()].concat();
                            return Ok(self.heap.allocate_value(HeapData::Tuple(joined))?);
                        }
                        _ => {}
                    }
                }
                Err(self.bad_operands("+", &left, &right, program))
            }
            BinaryOpKind::Mul => {
                let (seq, count) = if left.as_index().is_some() {
                    (&right, left.as_index().expect("checked"))
                } else if right.as_index().is_some() {
                    (&left, right.as_index().expect("checked"))
                } else {
                    return Err(self.bad_operands("*", &left, &right, program));
                };
                let count = usize::try_from(count.max(0)).expect("non-negative");
                if let Some(s) = seq.as_str(&self.heap, interns) {
                    let repeated = s.repeat(count);
                    return Ok(self.heap.allocate_value(HeapData::Str(repeated))?);
                }
                if let Some(b) = seq.as_bytes(&self.heap, interns) {
                    let repeated = b.repeat(count);
                    return Ok(self.heap.allocate_value(HeapData::Bytes(repeated))?);
                }
                if let Value::Ref(id) = seq {
                    match self.heap.get(*id) {
                        HeapData::List(items) => {
                            let repeated = items.iter().cloned().cycle().take(items.len() * count).collect();
                            return Ok(self.heap.allocate_value(HeapData::List(repeated))?);
                        }
                        HeapData::Tuple(items) => {
                            let repeated = items.iter().cloned().cycle().take(items.len() * count).collect();
                            return Ok(self.heap.allocate_value(HeapData::Tuple(repeated))?);
                        }
                        _ => {}
                    }
                }
                Err(self.bad_operands("*", &left, &right, program))
            }
            BinaryOpKind::TrueDiv => {
                // Path joining: path / 'segment'.
                if let Value::Ref(id) = &left
                    && let HeapData::Path(path) = self.heap.get(*id)
                {
                    let path = path.clone();
                    let segment = match right.as_str(&self.heap, interns) {
                        Some(s) => s.to_owned(),
                        None => match &right {
                            Value::Ref(rid) => match self.heap.get(*rid) {
                                HeapData::Path(other) => other.as_str().to_owned(),
                                _ => return Err(self.bad_operands("/", &left, &right, program)),
                            },
                            _ => return Err(self.bad_operands("/", &left, &right, program)),
                        },
                    };
                    let joined = path.join(&segment);
                    return Ok(self.heap.allocate_value(HeapData::Path(joined))?);
                }
                // 'segment' / path is also valid pathlib.
                if let (Some(s), Value::Ref(id)) = (left.as_str(&self.heap, interns), &right)
                    && let HeapData::Path(path) = self.heap.get(*id)
                {
                    let joined = PyPath::new(s).join(path.as_str());
                    return Ok(self.heap.allocate_value(HeapData::Path(joined))?);
                }
                Err(self.bad_operands("/", &left, &right, program))
            }
            BinaryOpKind::Mod => {
                if let Some(format) = left.as_str(&self.heap, interns) {
                    let format = format.to_owned();
                    let formatted = self.format_mod(&format, &right, program)?;
                    return Ok(self.heap.allocate_value(HeapData::Str(formatted))?);
                }
                Err(self.bad_operands("%", &left, &right, program))
            }
            BinaryOpKind::Sub | BinaryOpKind::BitAnd | BinaryOpKind::BitOr | BinaryOpKind::BitXor => {
                self.set_algebra(kind, &left, &right, program)
            }
            _ => Err(self.bad_operands(op_symbol(kind), &left, &right, program)),
        }
    }

    /// Set difference / intersection / union / symmetric difference.
    fn set_algebra(
        &mut self,
        kind: BinaryOpKind,
        left: &Value,
        right: &Value,
        program: &Program,
    ) -> RunResult<Value> {
        let interns = &program.interns;
        let (Value::Ref(a), Value::Ref(b)) = (left, right) else {
            return Err(self.bad_operands(op_symbol(kind), left, right, program));
        };
        let (HeapData::Set(x), HeapData::Set(y)) = (self.heap.get(*a), self.heap.get(*b)) else {
            return Err(self.bad_operands(op_symbol(kind), left, right, program));
        };
        let left_items: Vec<Value> = x.entries().iter().map(|e| e.value.clone()).collect();
        let right_items: Vec<Value> = y.entries().iter().map(|e| e.value.clone()).collect();
        let (a, b) = (*a, *b);

        let result = self.heap.allocate_value(HeapData::Set(Set::new()))?;
        let Value::Ref(result_id) = result else { unreachable!() };
        match kind {
            BinaryOpKind::BitOr => {
                for item in left_items.into_iter().chain(right_items) {
                    set_insert(&mut self.heap, result_id, item, interns)?;
                }
            }
            BinaryOpKind::BitAnd => {
                for item in left_items {
                    if crate::types::set::set_contains(&self.heap, b, &item, interns)? {
                        set_insert(&mut self.heap, result_id, item, interns)?;
                    }
                }
            }
            BinaryOpKind::Sub => {
                for item in left_items {
                    if !crate::types::set::set_contains(&self.heap, b, &item, interns)? {
                        set_insert(&mut self.heap, result_id, item, interns)?;
                    }
                }
            }
            BinaryOpKind::BitXor => {
                for item in left_items {
                    if !crate::types::set::set_contains(&self.heap, b, &item, interns)? {
                        set_insert(&mut self.heap, result_id, item, interns)?;
                    }
                }
                for item in right_items {
                    if !crate::types::set::set_contains(&self.heap, a, &item, interns)? {
                        set_insert(&mut self.heap, result_id, item, interns)?;
                    }
                }
            }
            _ => unreachable!("filtered by caller"),
        }
        Ok(result)
    }

    /// Printf-style `%` formatting for the supported conversions.
    fn format_mod(&mut self, format: &str, args: &Value, program: &Program) -> RunResult<String> {
        let interns = &program.interns;
        let values: Vec<Value> = match args {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Tuple(items) => items.clone(),
                _ => vec![args.clone()],
            },
            _ => vec![args.clone()],
        };
        let mut out = String::with_capacity(format.len());
        let mut next = 0_usize;
        let mut chars = format.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                out.push(ch);
                continue;
            }
            let Some(conversion) = chars.next() else {
                return Err(ExcType::value_error("incomplete format"));
            };
            if conversion == '%' {
                out.push('%');
                continue;
            }
            let Some(value) = values.get(next) else {
                return Err(ExcType::type_error("not enough arguments for format string"));
            };
            next += 1;
            match conversion {
                's' => out.push_str(&value.py_str(&self.heap, interns)),
                'r' => out.push_str(&value.py_repr(&self.heap, interns)),
                'd' | 'i' => match value.as_index() {
                    Some(i) => out.push_str(&i.to_string()),
                    None => {
                        return Err(ExcType::type_error(format!(
                            "%d format: a real number is required, not {}",
                            value.type_name(&self.heap, interns)
                        )));
                    }
                },
                'f' => match value.as_number(&self.heap) {
                    Some(f) => {
                        use std::fmt::Write as _;
                        let _ = write!(out, "{f:.6}");
                    }
                    None => {
                        return Err(ExcType::type_error(format!(
                            "%f format: a real number is required, not {}",
                            value.type_name(&self.heap, interns)
                        )));
                    }
                },
                'x' => match value.as_index() {
                    Some(i) => {
                        use std::fmt::Write as _;
                        let _ = write!(out, "{i:x}");
                    }
                    None => {
                        return Err(ExcType::type_error("%x format: an integer is required"));
                    }
                },
                other => {
                    return Err(ExcType::value_error(format!(
                        "unsupported format character '{other}'"
                    )));
                }
            }
        }
        if next < values.len() {
            return Err(ExcType::type_error("not all arguments converted during string formatting"));
        }
        Ok(out)
    }

    /// Builds the canonical unsupported-operands error.
    pub(super) fn bad_operands(
        &self,
        symbol: &str,
        left: &Value,
        right: &Value,
        program: &Program,
    ) -> RunError {
        ExcType::type_error(format!(
            "unsupported operand type(s) for {symbol}: '{}' and '{}'",
            left.type_name(&self.heap, &program.interns),
            right.type_name(&self.heap, &program.interns)
        ))
    }
}

/// Float arithmetic, with Python's division and modulo semantics.
fn float_op(kind: BinaryOpKind, a: f64, b: f64) -> RunResult<Value> {
    let result = match kind {
        BinaryOpKind::Add => a + b,
        BinaryOpKind::Sub => a - b,
        BinaryOpKind::Mul => a * b,
        BinaryOpKind::TrueDiv => {
            if b == 0.0 {
                return Err(ExcType::float_division_by_zero());
            }
            a / b
        }
        BinaryOpKind::FloorDiv => {
            if b == 0.0 {
                return Err(ExcType::float_floor_division_by_zero());
            }
            (a / b).floor()
        }
        BinaryOpKind::Mod => {
            if b == 0.0 {
                return Err(ExcType::float_modulo_by_zero());
            }
            // Result takes the divisor's sign, as in Python.
            a - b * (a / b).floor()
        }
        BinaryOpKind::Pow => a.powf(b),
        _ => {
            return Err(ExcType::type_error(format!(
                "unsupported operand type(s) for {}: 'float' and 'float'",
                op_symbol(kind)
            )));
        }
    };
    Ok(Value::Float(result))
}

/// The operator's source symbol, for error messages.
fn op_symbol(kind: BinaryOpKind) -> &'static str {
    match kind {
        BinaryOpKind::Add => "+",
        BinaryOpKind::Sub => "-",
        BinaryOpKind::Mul => "*",
        BinaryOpKind::TrueDiv => "/",
        BinaryOpKind::FloorDiv => "//",
        BinaryOpKind::Mod => "%",
        BinaryOpKind::Pow => "**",
        BinaryOpKind::LShift => "<<",
        BinaryOpKind::RShift => ">>",
        BinaryOpKind::BitAnd => "&",
        BinaryOpKind::BitOr => "|",
        BinaryOpKind::BitXor => "^",
    }
}

/// Whether a value is a heap bignum.
fn is_bigint<T: ResourceTracker>(value: &Value, vm: &VM<T>) -> bool {
    matches!(value, Value::Ref(id) if matches!(vm.heap.get(*id), HeapData::LongInt(_)))
}

/// The canonical unary-operand error.
fn bad_unary<T: ResourceTracker>(symbol: &str, value: &Value, vm: &VM<T>, program: &Program) -> RunError {
    ExcType::type_error(format!(
        "bad operand type for unary {symbol}: '{}'",
        value.type_name(&vm.heap, &program.interns)
    ))
}
