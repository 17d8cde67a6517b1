//! User-visible texts. The bot speaks Portuguese only.

use rust_decimal::Decimal;

use crate::nutrition::{aggregator, NutrientField, NutrientVector, TARGET};

/// Whole-number rendering, truncated towards zero.
pub fn amount(value: Decimal) -> String {
    value.trunc().normalize().to_string()
}

pub fn grams(value: Decimal) -> String {
    format!("{}g", value.normalize())
}

pub fn help() -> String {
    "📸 Envie a foto da refeição e depois uma descrição\n\
     /resumo → média semanal\n\
     'primeira refeição' → reinicia o dia"
        .to_string()
}

pub fn unknown_command(command: &str) -> String {
    format!("Comando desconhecido: {command}\n\n{}", help())
}

pub fn photo_received() -> String {
    "📸 Foto recebida! Agora descreva a refeição.".to_string()
}

pub fn photo_download_failed() -> String {
    "😕 Não consegui baixar a foto. Envie de novo, por favor.".to_string()
}

pub fn idle_hint() -> String {
    "📸 Envie primeiro a foto da refeição.".to_string()
}

pub fn identified(food_name: &str, estimated: Decimal, matched: bool) -> String {
    let mut out = format!("🍽️ {food_name}\n📏 Estimado: {}\n", grams(estimated));
    if !matched {
        out.push_str("⚠️ Alimento não encontrado na base nutricional; será contado como zero.\n");
    }
    out.push_str("Digite a quantidade real em gramas ou 'ok'");
    out
}

pub fn identification_failed() -> String {
    "😕 Não consegui identificar o alimento agora. Envie a descrição de novo.".to_string()
}

pub fn not_a_quantity(text: &str) -> String {
    format!("❌ \"{}\" não é uma quantidade válida. Digite um número de gramas maior que zero ou 'ok'.", text.trim())
}

/// Day totals against the target, one line per nutrient, then the calorie balance.
pub fn day_totals(totals: NutrientVector) -> String {
    let mut lines: Vec<String> = NutrientField::ALL
        .iter()
        .map(|f| {
            format!(
                "{} {}/{} {}",
                f.icon(),
                amount(totals.get(*f)),
                amount(TARGET.get(*f)),
                f.unit()
            )
        })
        .collect();
    let remaining = aggregator::remaining(totals);
    if remaining > Decimal::ZERO {
        lines.push(format!("✅ Faltam {} kcal para a meta", amount(remaining)));
    } else {
        lines.push(format!("⚠️ Meta de calorias ultrapassada em {} kcal", amount(-remaining)));
    }
    lines.join("\n")
}

pub fn commit_not_saved(totals: NutrientVector) -> String {
    format!(
        "⚠️ Registrei a refeição, mas não consegui salvar. Ela pode se perder se o bot reiniciar.\n\n{}",
        day_totals(totals)
    )
}

pub fn day_reset() -> String {
    "🔄 Novo dia iniciado".to_string()
}

pub fn day_reset_not_saved() -> String {
    "⚠️ Dia reiniciado, mas não consegui salvar a alteração.".to_string()
}

pub fn weekly(average: NutrientVector) -> String {
    let mut out = "📊 Últimos 7 dias (média)".to_string();
    for f in NutrientField::ALL {
        out.push_str(&format!("\n{} {} {}", f.icon(), amount(average.get(f)), f.unit()));
    }
    out
}

pub fn no_data() -> String {
    "Sem dados ainda 🙂".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::vector::nv;

    #[test]
    fn amounts_truncate() {
        assert_eq!(amount(Decimal::new(3259, 1)), "325");
        assert_eq!(amount(Decimal::new(3250, 1)), "325");
        assert_eq!(amount(Decimal::ZERO), "0");
        assert_eq!(grams(Decimal::new(2500, 1)), "250g");
        assert_eq!(grams(Decimal::new(1805, 1)), "180.5g");
    }

    #[test]
    fn totals_report_remaining_calories() {
        let text = day_totals(nv("325", "6.75", "0.75", "70.2"));
        assert!(text.contains("🔥 325/3300 kcal"));
        assert!(text.contains("🥩 6/175 g"));
        assert!(text.contains("🥑 0/95 g"));
        assert!(text.contains("🍞 70/435 g"));
        assert!(text.contains("Faltam 2975 kcal"));
    }

    #[test]
    fn totals_report_exceeded_target() {
        let text = day_totals(nv("3500", "0", "0", "0"));
        assert!(text.contains("ultrapassada em 200 kcal"));

        let exact = day_totals(nv("3300", "0", "0", "0"));
        assert!(exact.contains("ultrapassada em 0 kcal"));
    }

    #[test]
    fn unmatched_food_is_flagged() {
        let text = identified("rice and beans", Decimal::from(250), false);
        assert!(text.contains("250g"));
        assert!(text.contains("não encontrado"));
        assert!(!identified("rice", Decimal::from(250), true).contains("não encontrado"));
    }

    #[test]
    fn weekly_lists_every_nutrient() {
        let text = weekly(nv("2000.9", "100", "60", "250"));
        assert!(text.contains("🔥 2000 kcal"));
        assert!(text.contains("🍞 250 g"));
    }
}
