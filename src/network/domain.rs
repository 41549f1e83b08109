use serde::Serialize;


/// Tipo de conectividad reportado por la plataforma.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    None,
    Wifi,
    Cellular,
    Other,
}


/// Estado de conectividad crudo, actualizado por callbacks de la plataforma.
///
/// Al arranque se asume conectividad disponible hasta que la capa de
/// plataforma reporte lo contrario.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct NetworkState {
    pub available: bool,
    pub kind: NetworkType,
    pub metered: bool,
}


impl NetworkState {

    pub fn initial() -> Self {
        Self {
            available: true,
            kind: NetworkType::Other,
            metered: false,
        }
    }

    pub fn offline() -> Self {
        Self {
            available: false,
            kind: NetworkType::None,
            metered: false,
        }
    }
}
