//! Status frames for tests.

use crate::schema::Register;
use strum::IntoEnumIterator as _;

/// Builds a well formed status frame that tests then bend out of shape.
///
/// Offsets given to [`FrameBuilder::set`] count from the register's tag, the same way the
/// property table does.
#[derive(Clone, Debug)]
pub(crate) struct FrameBuilder {
    registers: Vec<(Register, Vec<String>)>,
}

fn size(register: Register) -> usize {
    match register {
        Register::R2 | Register::R7 | Register::RE => 35,
        Register::R3 | Register::R4 | Register::R6 => 30,
        Register::R5 => 25,
        Register::R9 | Register::RA | Register::RB => 15,
        Register::RC => 12,
        Register::RG => 14,
    }
}

impl FrameBuilder {
    pub fn current() -> Self {
        Self::with_registers(Register::iter().collect(), "SW V5 17 05 31")
    }

    pub fn legacy() -> Self {
        let registers = Register::iter().filter(|r| *r != Register::RG).collect();
        Self::with_registers(registers, "SW V2 15 02 11")
    }

    fn with_registers(registers: Vec<Register>, version: &str) -> Self {
        let registers = registers
            .into_iter()
            .map(|register| (register, vec!["0".to_string(); size(register) - 1]))
            .collect();
        let builder = Self { registers };
        builder
            .set(Register::R2, 6, "14")
            .set(Register::R2, 7, "30")
            .set(Register::R2, 8, "15")
            .set(Register::R2, 9, "2")
            .set(Register::R2, 10, "3")
            .set(Register::R2, 11, "2024")
            .set(Register::R3, 6, version)
            .set(Register::R4, 1, "NORM")
            .set(Register::R5, 15, "375")
            .set(Register::R6, 8, "380")
            .set(Register::RG, 1, "1")
            .set(Register::RG, 2, "1")
            .set(Register::RG, 7, "1-1-014")
            .set(Register::RG, 8, "1-2-0234")
            .set(Register::RG, 9, "1-1-01")
            .set(Register::RG, 10, "0-1-0")
            .set(Register::RG, 11, "0-1-0")
    }

    /// Set the field at `offset` past the register's tag. Absent registers are ignored.
    pub fn set(mut self, register: Register, offset: usize, value: &str) -> Self {
        assert!(!value.is_empty() && !value.contains([',', ':']), "{value:?} would break framing");
        if let Some((_, data)) = self.registers.iter_mut().find(|(r, _)| *r == register) {
            data[offset - 1] = value.to_string();
        }
        self
    }

    pub fn without(mut self, register: Register) -> Self {
        self.registers.retain(|(r, _)| *r != register);
        self
    }

    /// Change the field count of a register, tag included.
    pub fn resize(mut self, register: Register, fields: usize) -> Self {
        if let Some((_, data)) = self.registers.iter_mut().find(|(r, _)| *r == register) {
            data.resize(fields - 1, "0".to_string());
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let registers: Vec<String> = self
            .registers
            .iter()
            .map(|(register, data)| format!("{register},{}", data.join(",")))
            .collect();
        format!("RF:,{},:\r\n", registers.join(":")).into_bytes()
    }
}
